use imageproc::filter::{bilateral::GaussianEuclideanColorDistance, bilateral_filter as ip_bilateral};

use crate::{
    filters::rgb_image,
    foundation::core::Frame,
    foundation::error::{VidstyleError, VidstyleResult},
};

/// Edge-aware smoothing over a window of `diameter` pixels, with a Gaussian on the Euclidean
/// RGB distance for the range weight.
pub fn bilateral_filter(
    src: &Frame,
    diameter: u32,
    sigma_color: f32,
    sigma_space: f32,
) -> VidstyleResult<Frame> {
    if !(sigma_color > 0.0 && sigma_space > 0.0) {
        return Err(VidstyleError::validation(
            "bilateral sigmas must be finite and > 0",
        ));
    }
    let radius = u8::try_from(diameter / 2).unwrap_or(u8::MAX);
    if radius == 0 {
        return Ok(src.clone());
    }

    let out = ip_bilateral(
        &rgb_image(src)?,
        radius,
        sigma_space,
        GaussianEuclideanColorDistance::new(sigma_color),
    );
    Frame::new(src.width, src.height, out.into_raw())
}
