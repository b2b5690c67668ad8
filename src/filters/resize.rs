use image::{RgbImage, imageops::FilterType};

use crate::{
    foundation::core::{Dimensions, Frame},
    foundation::error::{VidstyleError, VidstyleResult},
};

/// Resamples a frame to `target`. Frames already at `target` are returned as-is.
pub fn resize_frame(frame: Frame, target: Dimensions) -> VidstyleResult<Frame> {
    if frame.dimensions() == target {
        return Ok(frame);
    }
    let (width, height) = (frame.width, frame.height);
    let img = RgbImage::from_raw(width, height, frame.data).ok_or_else(|| {
        VidstyleError::validation(format!(
            "frame buffer does not match {width}x{height} rgb8"
        ))
    })?;
    let resized = image::imageops::resize(&img, target.width, target.height, FilterType::Triangle);
    Frame::new(target.width, target.height, resized.into_raw())
}
