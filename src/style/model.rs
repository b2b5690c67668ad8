use std::str::FromStr;

use crate::foundation::error::{VidstyleError, VidstyleResult};

/// Visual-effect category applied to every frame of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleSelector {
    OilPainting,
    Watercolor,
    Cartoon,
    Sketch,
    VintageFilter,
    Custom,
}

impl StyleSelector {
    pub const ALL: [StyleSelector; 6] = [
        StyleSelector::OilPainting,
        StyleSelector::Watercolor,
        StyleSelector::Cartoon,
        StyleSelector::Sketch,
        StyleSelector::VintageFilter,
        StyleSelector::Custom,
    ];

    /// Styles with a defined transform. The rest run the identity transform.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::OilPainting | Self::Watercolor | Self::Cartoon | Self::Sketch
        )
    }

    pub fn id(self) -> &'static str {
        match self {
            Self::OilPainting => "oil_painting",
            Self::Watercolor => "watercolor",
            Self::Cartoon => "cartoon",
            Self::Sketch => "sketch",
            Self::VintageFilter => "vintage_filter",
            Self::Custom => "custom",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::OilPainting => "Oil Painting",
            Self::Watercolor => "Watercolor",
            Self::Cartoon => "Cartoon",
            Self::Sketch => "Sketch",
            Self::VintageFilter => "Vintage Filter",
            Self::Custom => "Custom",
        }
    }

    // Display labels used by the desktop front-end and the presets it saved.
    fn legacy_label(self) -> &'static str {
        match self {
            Self::OilPainting => "油画风格",
            Self::Watercolor => "水彩风格",
            Self::Cartoon => "卡通/动漫风格",
            Self::Sketch => "素描风格",
            Self::VintageFilter => "复古滤镜",
            Self::Custom => "自定义风格",
        }
    }
}

impl std::fmt::Display for StyleSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for StyleSelector {
    type Err = VidstyleError;

    /// Resolves an id (`oil_painting`, `oil-painting`), an English label (`Oil Painting`)
    /// or a legacy display label. Anything else is an unsupported style.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let normalized = trimmed
            .to_ascii_lowercase()
            .replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|style| {
                style.id() == normalized
                    || style.label().eq_ignore_ascii_case(trimmed)
                    || style.legacy_label() == trimmed
            })
            .ok_or_else(|| VidstyleError::unsupported_style(format!("'{trimmed}'")))
    }
}

/// Per-run user parameters, always within range once constructed.
///
/// `new` clamps; deserialization and [`ParameterSet::validate`] reject.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "RawParameterSet")]
pub struct ParameterSet {
    strength: u8,
    saturation: i8,
    brightness: i8,
    scale_factor: f64,
}

#[derive(serde::Deserialize)]
struct RawParameterSet {
    #[serde(default = "default_strength")]
    strength: i64,
    #[serde(default)]
    saturation: i64,
    #[serde(default)]
    brightness: i64,
    #[serde(default = "default_scale")]
    scale_factor: f64,
}

fn default_strength() -> i64 {
    i64::from(ParameterSet::DEFAULT_STRENGTH)
}

fn default_scale() -> f64 {
    1.0
}

impl TryFrom<RawParameterSet> for ParameterSet {
    type Error = VidstyleError;

    fn try_from(raw: RawParameterSet) -> Result<Self, Self::Error> {
        Self::validate(raw.strength, raw.saturation, raw.brightness, raw.scale_factor)
    }
}

impl ParameterSet {
    pub const DEFAULT_STRENGTH: u8 = 50;
    pub const MIN_SCALE: f64 = 0.25;
    pub const MAX_SCALE: f64 = 1.0;

    /// Builds a parameter set, clamping every field into its range.
    pub fn new(strength: i32, saturation: i32, brightness: i32, scale_factor: f64) -> Self {
        let scale_factor = if scale_factor.is_finite() {
            scale_factor.clamp(Self::MIN_SCALE, Self::MAX_SCALE)
        } else {
            Self::MAX_SCALE
        };
        Self {
            strength: strength.clamp(0, 100) as u8,
            saturation: saturation.clamp(-100, 100) as i8,
            brightness: brightness.clamp(-100, 100) as i8,
            scale_factor,
        }
    }

    /// Builds a parameter set, rejecting any out-of-range field.
    pub fn validate(
        strength: i64,
        saturation: i64,
        brightness: i64,
        scale_factor: f64,
    ) -> VidstyleResult<Self> {
        if !(0..=100).contains(&strength) {
            return Err(VidstyleError::validation(format!(
                "strength must be within 0..=100, got {strength}"
            )));
        }
        if !(-100..=100).contains(&saturation) {
            return Err(VidstyleError::validation(format!(
                "saturation must be within -100..=100, got {saturation}"
            )));
        }
        if !(-100..=100).contains(&brightness) {
            return Err(VidstyleError::validation(format!(
                "brightness must be within -100..=100, got {brightness}"
            )));
        }
        let (lo, hi) = (Self::MIN_SCALE, Self::MAX_SCALE);
        if !scale_factor.is_finite() || !(lo..=hi).contains(&scale_factor) {
            return Err(VidstyleError::validation(format!(
                "scale_factor must be within {lo}..={hi}, got {scale_factor}"
            )));
        }
        Ok(Self {
            strength: strength as u8,
            saturation: saturation as i8,
            brightness: brightness as i8,
            scale_factor,
        })
    }

    pub fn strength(&self) -> u8 {
        self.strength
    }

    pub fn saturation(&self) -> i8 {
        self.saturation
    }

    pub fn brightness(&self) -> i8 {
        self.brightness
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    /// Strength normalized to `0.0..=1.0`.
    pub fn intensity(&self) -> f32 {
        f32::from(self.strength) / 100.0
    }

    pub fn is_unscaled(&self) -> bool {
        self.scale_factor >= Self::MAX_SCALE
    }

    pub fn has_color_adjustment(&self) -> bool {
        self.saturation != 0 || self.brightness != 0
    }
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self::new(i32::from(Self::DEFAULT_STRENGTH), 0, 0, 1.0)
    }
}
