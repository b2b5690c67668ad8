//! CPU pixel kernels. Every backend falls back to these.

use image::{GrayImage, RgbImage};

use crate::{
    foundation::core::{Frame, GrayPlane},
    foundation::error::{VidstyleError, VidstyleResult},
};

pub mod bilateral;
pub mod blur;
pub mod color;
pub mod edge_preserving;
pub mod resize;
pub mod threshold;

pub(crate) fn rgb_image(frame: &Frame) -> VidstyleResult<RgbImage> {
    let (width, height) = (frame.width, frame.height);
    RgbImage::from_raw(width, height, frame.data.clone()).ok_or_else(|| {
        VidstyleError::validation(format!("frame buffer does not match {width}x{height} rgb8"))
    })
}

pub(crate) fn gray_image(plane: &GrayPlane) -> VidstyleResult<GrayImage> {
    let (width, height) = (plane.width, plane.height);
    GrayImage::from_raw(width, height, plane.data.clone()).ok_or_else(|| {
        VidstyleError::validation(format!("gray buffer does not match {width}x{height}"))
    })
}
