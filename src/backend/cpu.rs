use crate::backend::{BackendKind, FilterBackend};

/// The default backend. Stateless, so every worker can call it concurrently.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        Self
    }
}

impl FilterBackend for CpuBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Cpu
    }
}
