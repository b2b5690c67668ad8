use crate::{
    foundation::core::GrayPlane,
    foundation::error::{VidstyleError, VidstyleResult},
};

/// Rounds to the nearest integer and bumps even results to the next odd value.
pub fn round_to_odd(x: f32) -> u32 {
    let r = x.round().max(1.0) as u32;
    if r.is_multiple_of(2) { r + 1 } else { r }
}

/// Sigma implied by an odd kernel size when no explicit sigma is given.
pub fn sigma_for_ksize(ksize: u32) -> f32 {
    0.3 * ((ksize as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Normalized floating-point Gaussian weights for a `2 * radius + 1` tap kernel.
pub fn gaussian_weights(radius: u32, sigma: f32) -> VidstyleResult<Vec<f32>> {
    if radius == 0 {
        return Ok(vec![1.0]);
    }
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(VidstyleError::validation("blur sigma must be > 0"));
    }

    let r = radius as i32;
    let denom = 2.0 * f64::from(sigma) * f64::from(sigma);
    let raw: Vec<f64> = (-r..=r)
        .map(|i| {
            let x = f64::from(i);
            (-x * x / denom).exp()
        })
        .collect();
    let sum: f64 = raw.iter().sum();
    if sum <= 0.0 {
        return Err(VidstyleError::validation("gaussian kernel sum is zero"));
    }
    Ok(raw.into_iter().map(|w| (w / sum) as f32).collect())
}

/// Separable Gaussian blur of a gray plane with an odd kernel size, clamping at the edges.
pub fn gaussian_blur_gray(src: &GrayPlane, ksize: u32) -> VidstyleResult<GrayPlane> {
    if ksize.is_multiple_of(2) {
        return Err(VidstyleError::validation(format!(
            "gaussian kernel size must be odd, got {ksize}"
        )));
    }
    let radius = ksize / 2;
    if radius == 0 || src.data.is_empty() {
        return Ok(src.clone());
    }

    let kernel = gaussian_kernel_q16(radius, sigma_for_ksize(ksize))?;
    let mut tmp = vec![0u8; src.data.len()];
    let mut out = vec![0u8; src.data.len()];

    horizontal_pass(&src.data, &mut tmp, src.width, src.height, &kernel);
    vertical_pass(&tmp, &mut out, src.width, src.height, &kernel);
    GrayPlane::new(src.width, src.height, out)
}

fn gaussian_kernel_q16(radius: u32, sigma: f32) -> VidstyleResult<Vec<u32>> {
    let weights_f = gaussian_weights(radius, sigma)?;

    let mut weights = Vec::<u32>::with_capacity(weights_f.len());
    let mut acc: i64 = 0;
    for &wf in &weights_f {
        let q = (f64::from(wf) * 65536.0).round() as i64;
        let q = q.clamp(0, 65536);
        weights.push(q as u32);
        acc += q;
    }
    let target: i64 = 65536;
    let delta = target - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        let mid_val = i64::from(weights[mid]);
        let new_mid = (mid_val + delta).clamp(0, 65536);
        weights[mid] = new_mid as u32;
    }

    Ok(weights)
}

fn horizontal_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    for y in 0..height as i32 {
        let row = (y * w) as usize;
        for x in 0..w {
            let mut acc = 0u64;
            for (ki, &kw) in k.iter().enumerate() {
                let sx = (x + ki as i32 - radius).clamp(0, w - 1);
                acc += u64::from(kw) * u64::from(src[row + sx as usize]);
            }
            dst[row + x as usize] = q16_to_u8(acc);
        }
    }
}

fn vertical_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    let h = height as i32;
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0u64;
            for (ki, &kw) in k.iter().enumerate() {
                let sy = (y + ki as i32 - radius).clamp(0, h - 1);
                acc += u64::from(kw) * u64::from(src[(sy * w + x) as usize]);
            }
            dst[(y * w + x) as usize] = q16_to_u8(acc);
        }
    }
}

fn q16_to_u8(acc: u64) -> u8 {
    let v = (acc + 32768) >> 16;
    (v.min(255)) as u8
}
