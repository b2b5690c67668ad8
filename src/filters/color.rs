use crate::foundation::core::Frame;

/// HSV pre-pass: scales saturation by `1 + saturation/100` and offsets value by
/// `brightness * 2.55`, clipping both. A zero adjustment returns the frame untouched.
pub fn adjust_saturation_brightness(frame: Frame, saturation: i8, brightness: i8) -> Frame {
    if saturation == 0 && brightness == 0 {
        return frame;
    }

    let sat_factor = 1.0 + f32::from(saturation) / 100.0;
    let value_offset = f32::from(brightness) * 2.55;

    let mut out = frame;
    for px in out.data.chunks_exact_mut(Frame::CHANNELS) {
        let (h, s, v) = rgb_to_hsv(px[0], px[1], px[2]);
        let s = (s * sat_factor).clamp(0.0, 1.0);
        let v = (v + value_offset).clamp(0.0, 255.0);
        let [r, g, b] = hsv_to_rgb(h, s, v);
        px[0] = r;
        px[1] = g;
        px[2] = b;
    }
    out
}

/// Returns hue in degrees `[0, 360)`, saturation in `[0, 1]` and value in `[0, 255]`.
fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let (r, g, b) = (f32::from(r), f32::from(g), f32::from(b));
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let s = if max > 0.0 { delta / max } else { 0.0 };
    let h = if delta <= f32::EPSILON {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    (h, s, max)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [u8; 3] {
    let c = v * s;
    let hp = (h / 60.0).rem_euclid(6.0);
    let x = c * (1.0 - (hp.rem_euclid(2.0) - 1.0).abs());
    let (r1, g1, b1) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = v - c;
    let to_u8 = |ch: f32| (ch + m).round().clamp(0.0, 255.0) as u8;
    [to_u8(r1), to_u8(g1), to_u8(b1)]
}
