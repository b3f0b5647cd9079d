/// Adapter and device selection for [`super::Gpu::new_headless`].
#[derive(Debug, Clone)]
pub struct GpuInit {
    pub backends: wgpu::Backends,
    pub power_preference: wgpu::PowerPreference,
    /// Pick the software adapter (lavapipe, WARP) if one is installed.
    pub force_fallback_adapter: bool,
    /// Nothing in the engine needs optional features; leave empty unless a
    /// custom shader does.
    pub required_features: wgpu::Features,
    /// Downlevel defaults cover the RGBA8 target, one uniform buffer and one
    /// sampled texture.
    pub required_limits: wgpu::Limits,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults(),
        }
    }
}

impl GpuInit {
    /// Software rendering, for CI machines without a GPU.
    pub fn software() -> Self {
        Self {
            power_preference: wgpu::PowerPreference::LowPower,
            force_fallback_adapter: true,
            ..Self::default()
        }
    }

    /// Backends named in `WGPU_BACKEND` (e.g. "vulkan,gl"), or all of them.
    pub fn with_env_backends(mut self) -> Self {
        self.backends = wgpu::Backends::from_env().unwrap_or(self.backends);
        self
    }
}
