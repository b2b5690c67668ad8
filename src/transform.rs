use crate::{
    backend::FilterBackend,
    filters::{
        blur::round_to_odd, color::adjust_saturation_brightness, edge_preserving::darken_edges,
        resize::resize_frame, threshold,
    },
    foundation::core::{Dimensions, Frame, GrayPlane},
    foundation::error::VidstyleResult,
    style::model::{ParameterSet, StyleSelector},
};

const CARTOON_MEDIAN_KSIZE: u32 = 5;
const CARTOON_THRESHOLD_C: f32 = 9.0;
const CARTOON_BILATERAL_DIAMETER: u32 = 9;
const CARTOON_BILATERAL_SIGMA: f32 = 250.0;
const SKETCH_BLEND_CUTOFF: f32 = 0.8;

/// Everything a worker needs to transform one frame; fixed for the whole run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformPlan {
    pub style: StyleSelector,
    pub params: ParameterSet,
    /// Post-scale output dimensions.
    pub target: Dimensions,
}

impl TransformPlan {
    pub fn new(style: StyleSelector, params: ParameterSet, source: Dimensions) -> Self {
        let target = if params.is_unscaled() {
            source
        } else {
            source.scaled(params.scale_factor())
        };
        Self {
            style,
            params,
            target,
        }
    }
}

/// Edge-preserving parameters `(sigma_s, sigma_r)` for the painterly styles.
pub fn stylization_sigmas(style: StyleSelector, intensity: f32) -> Option<(f32, f32)> {
    let (base_s, base_r) = match style {
        StyleSelector::OilPainting => (60.0, 0.6),
        StyleSelector::Watercolor => (100.0, 0.3),
        _ => return None,
    };
    Some((base_s * (1.0 + intensity), base_r * intensity))
}

pub fn cartoon_block_size(intensity: f32) -> u32 {
    round_to_odd(9.0 * (1.0 + intensity))
}

pub fn sketch_kernel_size(intensity: f32) -> u32 {
    round_to_odd(21.0 * (1.0 + intensity))
}

/// Resize, colour pre-pass, then style dispatch. Always returns a 3-channel frame.
pub fn transform_frame(
    frame: Frame,
    plan: &TransformPlan,
    backend: &dyn FilterBackend,
) -> VidstyleResult<Frame> {
    let frame = if plan.params.is_unscaled() {
        frame
    } else {
        resize_frame(frame, plan.target)?
    };
    let frame = adjust_saturation_brightness(
        frame,
        plan.params.saturation(),
        plan.params.brightness(),
    );

    let intensity = plan.params.intensity();
    if let Some((sigma_s, sigma_r)) = stylization_sigmas(plan.style, intensity) {
        return stylize(&frame, sigma_s, sigma_r, backend);
    }
    match plan.style {
        StyleSelector::Cartoon => cartoon(&frame, intensity, backend),
        StyleSelector::Sketch => sketch(&frame, intensity, backend),
        _ => Ok(frame),
    }
}

fn stylize(
    frame: &Frame,
    sigma_s: f32,
    sigma_r: f32,
    backend: &dyn FilterBackend,
) -> VidstyleResult<Frame> {
    let smoothed = backend.edge_preserving(frame, sigma_s, sigma_r)?;
    darken_edges(&smoothed)
}

fn cartoon(frame: &Frame, intensity: f32, backend: &dyn FilterBackend) -> VidstyleResult<Frame> {
    let gray = threshold::median_blur_gray(&frame.to_gray(), CARTOON_MEDIAN_KSIZE)?;
    let edges =
        threshold::adaptive_threshold_mean(&gray, cartoon_block_size(intensity), CARTOON_THRESHOLD_C)?;
    let mut color = backend.bilateral(
        frame,
        CARTOON_BILATERAL_DIAMETER,
        CARTOON_BILATERAL_SIGMA,
        CARTOON_BILATERAL_SIGMA,
    )?;

    for (px, &mask) in color
        .data
        .chunks_exact_mut(Frame::CHANNELS)
        .zip(&edges.data)
    {
        if mask == 0 {
            px.fill(0);
        }
    }
    Ok(color)
}

fn sketch(frame: &Frame, intensity: f32, backend: &dyn FilterBackend) -> VidstyleResult<Frame> {
    let gray = frame.to_gray();
    let inverted = gray.map(|v| 255 - v);
    let blurred = backend.gaussian_blur(&inverted, sketch_kernel_size(intensity))?;

    // Colour dodge: gray / (255 - blurred_inverted), scaled to 0..=255.
    let dodged: Vec<u8> = gray
        .data
        .iter()
        .zip(&blurred.data)
        .map(|(&g, &b)| {
            let denom = 255 - u32::from(b);
            if denom == 0 {
                255
            } else {
                ((u32::from(g) * 256) / denom).min(255) as u8
            }
        })
        .collect();
    let sketch = normalize_min_max(GrayPlane::new(gray.width, gray.height, dodged)?).to_frame();

    if intensity >= SKETCH_BLEND_CUTOFF {
        return Ok(sketch);
    }
    let keep = 1.0 - intensity;
    let data = frame
        .data
        .iter()
        .zip(&sketch.data)
        .map(|(&orig, &sk)| {
            (f32::from(orig) * keep + f32::from(sk) * intensity)
                .round()
                .clamp(0.0, 255.0) as u8
        })
        .collect();
    Frame::new(frame.width, frame.height, data)
}

fn normalize_min_max(plane: GrayPlane) -> GrayPlane {
    let (lo, hi) = plane
        .data
        .iter()
        .fold((u8::MAX, u8::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if hi <= lo {
        return plane;
    }
    let range = f32::from(hi - lo);
    plane.map(|v| ((f32::from(v - lo) * 255.0) / range).round() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::cpu::CpuBackend;

    fn gradient_frame(w: u32, h: u32) -> Frame {
        let mut data = Vec::with_capacity((w * h * 3) as usize);
        for y in 0..h {
            for x in 0..w {
                data.extend_from_slice(&[
                    (x * 255 / w.max(1)) as u8,
                    (y * 255 / h.max(1)) as u8,
                    ((x + y) * 7 % 256) as u8,
                ]);
            }
        }
        Frame::new(w, h, data).unwrap()
    }

    #[test]
    fn style_constants_follow_strength() {
        assert_eq!(
            stylization_sigmas(StyleSelector::OilPainting, 0.0),
            Some((60.0, 0.0))
        );
        assert_eq!(
            stylization_sigmas(StyleSelector::Watercolor, 1.0),
            Some((200.0, 0.3))
        );
        assert_eq!(stylization_sigmas(StyleSelector::Cartoon, 0.5), None);
        assert_eq!(cartoon_block_size(0.0), 9);
        assert_eq!(cartoon_block_size(1.0), 19);
        assert_eq!(sketch_kernel_size(0.0), 21);
        assert_eq!(sketch_kernel_size(1.0), 43);
    }

    #[test]
    fn plan_derives_scaled_target() {
        let source = Dimensions::new(640, 360).unwrap();
        let plan = TransformPlan::new(
            StyleSelector::Sketch,
            ParameterSet::new(50, 0, 0, 0.5),
            source,
        );
        assert_eq!(plan.target, Dimensions::new(320, 180).unwrap());

        let validated = ParameterSet::validate(50, 0, 0, 0.7).unwrap();
        let plan = TransformPlan::new(
            StyleSelector::Sketch,
            validated,
            Dimensions::new(5, 15).unwrap(),
        );
        assert_eq!(plan.target, Dimensions::new(4, 11).unwrap());
    }

    #[test]
    fn identity_styles_return_input_without_adjustment() {
        let f = gradient_frame(8, 6);
        for style in [StyleSelector::Custom, StyleSelector::VintageFilter] {
            let plan = TransformPlan::new(style, ParameterSet::new(80, 0, 0, 1.0), f.dimensions());
            let out = transform_frame(f.clone(), &plan, &CpuBackend).unwrap();
            assert_eq!(out, f);
        }
    }

    #[test]
    fn identity_styles_still_apply_pre_pass() {
        let f = gradient_frame(8, 6);
        let plan = TransformPlan::new(
            StyleSelector::Custom,
            ParameterSet::new(50, 0, -100, 1.0),
            f.dimensions(),
        );
        let out = transform_frame(f, &plan, &CpuBackend).unwrap();
        assert!(out.data.iter().all(|&v| v == 0));
    }

    #[test]
    fn cartoon_mask_paints_edges_black() {
        let (w, h) = (24u32, 24u32);
        let mut data = Vec::new();
        for _y in 0..h {
            for x in 0..w {
                let v = if (11..=13).contains(&x) { 10 } else { 220 };
                data.extend_from_slice(&[v, v, v]);
            }
        }
        let f = Frame::new(w, h, data).unwrap();
        let plan = TransformPlan::new(
            StyleSelector::Cartoon,
            ParameterSet::new(0, 0, 0, 1.0),
            f.dimensions(),
        );
        let out = transform_frame(f, &plan, &CpuBackend).unwrap();
        assert_eq!(out.pixel(12, 12), [0, 0, 0]);
        assert!(out.pixel(3, 12).iter().all(|&v| v.abs_diff(220) <= 1));
    }

    #[test]
    fn sketch_of_flat_frame_is_white() {
        let f = Frame::filled(10, 10, [90, 90, 90]);
        let plan = TransformPlan::new(
            StyleSelector::Sketch,
            ParameterSet::new(100, 0, 0, 1.0),
            f.dimensions(),
        );
        let out = transform_frame(f, &plan, &CpuBackend).unwrap();
        assert_eq!(out.data.len(), 10 * 10 * 3);
        assert!(out.data.iter().all(|&v| v == 255 || v == 90));
    }

    #[test]
    fn every_style_survives_parameter_extremes() {
        let f = gradient_frame(21, 13);
        for style in StyleSelector::ALL {
            for strength in [0, 100] {
                for sat in [-100, 100] {
                    for bright in [-100, 100] {
                        for scale in [0.25f64, 1.0] {
                            let params = ParameterSet::new(strength, sat, bright, scale);
                            let plan = TransformPlan::new(style, params, f.dimensions());
                            let out = transform_frame(f.clone(), &plan, &CpuBackend)
                                .unwrap_or_else(|e| {
                                    panic!("{style:?} {params:?} failed: {e}")
                                });
                            assert_eq!(out.dimensions(), plan.target);
                            assert_eq!(
                                out.data.len(),
                                plan.target.pixel_count() * Frame::CHANNELS
                            );
                        }
                    }
                }
            }
        }
    }
}
