use crate::foundation::error::{VidstyleError, VidstyleResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> VidstyleResult<Self> {
        if width == 0 || height == 0 {
            return Err(VidstyleError::validation(
                "dimensions must be non-zero in both axes",
            ));
        }
        Ok(Self { width, height })
    }

    /// Uniformly scaled dimensions, rounded to the nearest pixel and never below 1.
    pub fn scaled(self, factor: f64) -> Self {
        let scale = |v: u32| ((f64::from(v) * factor).round() as u32).max(1);
        Self {
            width: scale(self.width),
            height: scale(self.height),
        }
    }

    pub fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    pub num: u32,
    pub den: u32, // must be > 0
}

impl Fps {
    pub fn new(num: u32, den: u32) -> VidstyleResult<Self> {
        if den == 0 {
            return Err(VidstyleError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(VidstyleError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// `num/den` in the form ffmpeg accepts for `-r`.
    pub fn to_ffmpeg_arg(self) -> String {
        format!("{}/{}", self.num, self.den)
    }
}

/// An owned 3-channel RGB8 image.
///
/// Frames move by value between the scheduler and its workers; nothing mutates a frame
/// that another thread can see.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Frame {
    pub const CHANNELS: usize = 3;

    pub fn new(width: u32, height: u32, data: Vec<u8>) -> VidstyleResult<Self> {
        let expected = expected_len(width, height, Self::CHANNELS)?;
        if data.len() != expected {
            return Err(VidstyleError::validation(format!(
                "frame buffer size mismatch: got {} bytes, expected {expected} for {width}x{height} rgb8",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let n = width as usize * height as usize;
        Self {
            width,
            height,
            data: rgb.repeat(n),
        }
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let i = (y as usize * self.width as usize + x as usize) * Self::CHANNELS;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    /// Rec.601 luma plane.
    pub fn to_gray(&self) -> GrayPlane {
        let data = self
            .data
            .chunks_exact(Self::CHANNELS)
            .map(|px| {
                let [r, g, b] = [px[0], px[1], px[2]].map(f32::from);
                let y = 0.299 * r + 0.587 * g + 0.114 * b;
                y.round().clamp(0.0, 255.0) as u8
            })
            .collect();
        GrayPlane {
            width: self.width,
            height: self.height,
            data,
        }
    }
}

/// Single-channel 8-bit intermediate used inside the transform stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayPlane {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl GrayPlane {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> VidstyleResult<Self> {
        let expected = expected_len(width, height, 1)?;
        if data.len() != expected {
            return Err(VidstyleError::validation(format!(
                "gray plane size mismatch: got {} bytes, expected {expected}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn map(&self, f: impl Fn(u8) -> u8) -> Self {
        Self {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Replicates the plane into all three channels.
    pub fn to_frame(&self) -> Frame {
        let mut data = Vec::with_capacity(self.data.len() * Frame::CHANNELS);
        for &v in &self.data {
            data.extend_from_slice(&[v, v, v]);
        }
        Frame {
            width: self.width,
            height: self.height,
            data,
        }
    }
}

fn expected_len(width: u32, height: u32, channels: usize) -> VidstyleResult<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(channels))
        .ok_or_else(|| VidstyleError::validation("frame buffer size overflow"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_dimensions_round_and_never_collapse() {
        let d = Dimensions::new(641, 361).unwrap();
        assert_eq!(
            d.scaled(0.25),
            Dimensions {
                width: 160,
                height: 90
            }
        );
        assert_eq!(d.scaled(1.0), d);

        let tiny = Dimensions::new(1, 1).unwrap();
        assert_eq!(tiny.scaled(0.25), tiny);
    }

    #[test]
    fn scaled_dimensions_round_half_up() {
        let d = Dimensions::new(5, 15).unwrap();
        assert_eq!(
            d.scaled(0.7),
            Dimensions {
                width: 4,
                height: 11
            }
        );
    }

    #[test]
    fn frame_rejects_wrong_buffer_length() {
        assert!(Frame::new(2, 2, vec![0; 12]).is_ok());
        assert!(Frame::new(2, 2, vec![0; 16]).is_err());
    }

    #[test]
    fn gray_roundtrip_keeps_three_channels() {
        let f = Frame::filled(3, 2, [255, 255, 255]);
        let g = f.to_gray();
        assert!(g.data.iter().all(|&v| v == 255));
        let back = g.to_frame();
        assert_eq!(back.data.len(), 3 * 2 * 3);
        assert_eq!(back, f);
    }

    #[test]
    fn fps_validation() {
        assert!(Fps::new(0, 1).is_err());
        assert!(Fps::new(30, 0).is_err());
        let fps = Fps::new(30000, 1001).unwrap();
        assert_eq!(fps.to_ffmpeg_arg(), "30000/1001");
        assert!((fps.as_f64() - 29.97).abs() < 0.01);
    }
}
