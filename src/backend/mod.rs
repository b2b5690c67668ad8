use crate::{
    filters,
    foundation::core::{Frame, GrayPlane},
    foundation::error::{VidstyleError, VidstyleResult},
};

pub mod cpu;
#[cfg(feature = "gpu")]
pub mod gpu;

/// Which execution path a run uses for pixel work.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Default path: portable CPU kernels.
    Cpu,
    /// Accelerated path: compute shaders on a GPU adapter.
    Gpu,
}

/// Requested backend, resolved once per run by [`select_backend`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendPreference {
    /// Accelerated when an adapter is available, otherwise CPU.
    #[default]
    Auto,
    Cpu,
    /// Accelerated or fail.
    Gpu,
}

impl std::str::FromStr for BackendPreference {
    type Err = VidstyleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" | "default" => Ok(Self::Cpu),
            "gpu" | "accelerated" => Ok(Self::Gpu),
            other => Err(VidstyleError::validation(format!(
                "unknown backend '{other}' (expected auto, cpu or gpu)"
            ))),
        }
    }
}

/// Primitive pixel operations the transform stage is built from.
///
/// Implementations must produce equivalent (not bit-identical) output. The default methods
/// run the CPU kernels, so a backend only overrides what it accelerates. Backends are shared
/// by all workers of a run and must serialize any device access internally.
pub trait FilterBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn gaussian_blur(&self, plane: &GrayPlane, ksize: u32) -> VidstyleResult<GrayPlane> {
        filters::blur::gaussian_blur_gray(plane, ksize)
    }

    fn bilateral(
        &self,
        frame: &Frame,
        diameter: u32,
        sigma_color: f32,
        sigma_space: f32,
    ) -> VidstyleResult<Frame> {
        filters::bilateral::bilateral_filter(frame, diameter, sigma_color, sigma_space)
    }

    fn edge_preserving(&self, frame: &Frame, sigma_s: f32, sigma_r: f32) -> VidstyleResult<Frame> {
        filters::edge_preserving::edge_preserving_filter(frame, sigma_s, sigma_r)
    }
}

/// Resolves a preference into a concrete backend by probing the runtime once.
#[tracing::instrument]
pub fn select_backend(pref: BackendPreference) -> VidstyleResult<Box<dyn FilterBackend>> {
    match pref {
        BackendPreference::Cpu => Ok(Box::new(cpu::CpuBackend::new())),
        BackendPreference::Gpu => probe_accelerated(),
        BackendPreference::Auto => match probe_accelerated() {
            Ok(backend) => Ok(backend),
            Err(e) => {
                tracing::info!("accelerated backend unavailable, using cpu: {e}");
                Ok(Box::new(cpu::CpuBackend::new()))
            }
        },
    }
}

#[cfg(feature = "gpu")]
fn probe_accelerated() -> VidstyleResult<Box<dyn FilterBackend>> {
    Ok(Box::new(gpu::GpuBackend::probe()?))
}

#[cfg(not(feature = "gpu"))]
fn probe_accelerated() -> VidstyleResult<Box<dyn FilterBackend>> {
    Err(VidstyleError::validation(
        "gpu backend requires the 'gpu' feature",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preference_parsing() {
        assert_eq!(
            "auto".parse::<BackendPreference>().unwrap(),
            BackendPreference::Auto
        );
        assert_eq!(
            "Accelerated".parse::<BackendPreference>().unwrap(),
            BackendPreference::Gpu
        );
        assert!("tpu".parse::<BackendPreference>().is_err());
    }

    #[test]
    fn cpu_preference_always_resolves() {
        let backend = select_backend(BackendPreference::Cpu).unwrap();
        assert_eq!(backend.kind(), BackendKind::Cpu);
    }

    #[test]
    fn auto_never_fails() {
        let backend = select_backend(BackendPreference::Auto).unwrap();
        assert!(matches!(backend.kind(), BackendKind::Cpu | BackendKind::Gpu));
    }

    #[cfg(not(feature = "gpu"))]
    #[test]
    fn explicit_gpu_without_feature_is_an_error() {
        assert!(select_backend(BackendPreference::Gpu).is_err());
    }
}
