use imageproc::filter::{box_filter, median_filter};

use crate::{
    filters::gray_image,
    foundation::core::GrayPlane,
    foundation::error::{VidstyleError, VidstyleResult},
};

/// Median filter over an odd `ksize x ksize` window.
pub fn median_blur_gray(src: &GrayPlane, ksize: u32) -> VidstyleResult<GrayPlane> {
    if ksize.is_multiple_of(2) {
        return Err(VidstyleError::validation(format!(
            "median kernel size must be odd, got {ksize}"
        )));
    }
    let radius = ksize / 2;
    if radius == 0 {
        return Ok(src.clone());
    }
    let out = median_filter(&gray_image(src)?, radius, radius);
    GrayPlane::new(src.width, src.height, out.into_raw())
}

/// Binary mask from adaptive mean thresholding: 255 where a pixel is brighter than the mean
/// of its `block x block` neighbourhood minus `c`, 0 elsewhere.
///
/// `imageproc::contrast::adaptive_threshold` has no offset, so the local mean comes from a
/// box filter and the offset is applied here.
pub fn adaptive_threshold_mean(src: &GrayPlane, block: u32, c: f32) -> VidstyleResult<GrayPlane> {
    if block < 3 || block.is_multiple_of(2) {
        return Err(VidstyleError::validation(format!(
            "adaptive threshold block size must be odd and >= 3, got {block}"
        )));
    }
    let radius = block / 2;
    let means = box_filter(&gray_image(src)?, radius, radius);
    let out = src
        .data
        .iter()
        .zip(means.as_raw())
        .map(|(&v, &mean)| {
            if f32::from(v) > f32::from(mean) - c {
                255
            } else {
                0
            }
        })
        .collect();
    GrayPlane::new(src.width, src.height, out)
}
