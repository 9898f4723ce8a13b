//! Acquiring a device and checking it can run the particle kernels.

use std::fmt;

use crate::constants::WORK_GROUP_SIZE;

/// The GPU can't run this layer. Never fatal; the layer just stays inert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    NoAdapter,
    NoDevice(String),
    MissingFeature(&'static str),
    InsufficientLimit(&'static str),
}

impl fmt::Display for CapabilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAdapter => write!(f, "no suitable GPU adapter"),
            Self::NoDevice(err) => write!(f, "could not open GPU device: {err}"),
            Self::MissingFeature(feature) => write!(f, "GPU lacks {feature}"),
            Self::InsufficientLimit(limit) => write!(f, "GPU limit too low: {limit}"),
        }
    }
}

impl std::error::Error for CapabilityError {}

/// Creating shaders, pipelines or buffers failed. This is a bug, not an environment problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitError {
    ResourceCreation(String),
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResourceCreation(err) => write!(f, "could not create GPU resources: {err}"),
        }
    }
}

impl std::error::Error for InitError {}

/// Handles to one GPU. Cheap to clone; every clone refers to the same device.
#[derive(Debug, Clone)]
pub struct GpuContext {
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    pub async fn request(
        instance: &wgpu::Instance,
        compatible_surface: Option<&wgpu::Surface<'_>>,
    ) -> Result<Self, CapabilityError> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface,
            })
            .await
            .map_err(|_| CapabilityError::NoAdapter)?;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("snowfall_device"),
                required_limits: wgpu::Limits::downlevel_defaults()
                    .using_resolution(adapter.limits()),
                ..Default::default()
            })
            .await
            .map_err(|err| CapabilityError::NoDevice(err.to_string()))?;

        log::info!("Using adapter {:?}", adapter.get_info().name);

        Ok(Self {
            adapter,
            device,
            queue,
        })
    }

    /// Checks what this adapter can do against what the kernels need.
    pub fn probe(&self) -> Result<(), CapabilityError> {
        probe(
            &self.adapter.get_downlevel_capabilities(),
            &self.device.limits(),
        )
    }
}

pub fn probe(
    downlevel: &wgpu::DownlevelCapabilities,
    limits: &wgpu::Limits,
) -> Result<(), CapabilityError> {
    if !downlevel.flags.contains(wgpu::DownlevelFlags::COMPUTE_SHADERS) {
        return Err(CapabilityError::MissingFeature("compute shaders"));
    }
    if !downlevel.flags.contains(wgpu::DownlevelFlags::VERTEX_STORAGE) {
        return Err(CapabilityError::MissingFeature("storage buffers in vertex shaders"));
    }
    // Position + velocity/seed are bound together in the update kernel.
    if limits.max_storage_buffers_per_shader_stage < 2 {
        return Err(CapabilityError::InsufficientLimit(
            "max_storage_buffers_per_shader_stage",
        ));
    }
    if limits.max_compute_workgroup_size_x < WORK_GROUP_SIZE
        || limits.max_compute_invocations_per_workgroup < WORK_GROUP_SIZE
    {
        return Err(CapabilityError::InsufficientLimit("compute workgroup size"));
    }
    Ok(())
}
