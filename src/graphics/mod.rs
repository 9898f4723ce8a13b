use crate::fs::SnowOptions;

pub mod billboard;
pub mod camera;
pub mod fog;
pub mod frame;
pub mod gpu;
pub mod particles;

use camera::CameraFrame;
use frame::{FpsMeter, SimulationUniforms};
use gpu::{CapabilityError, GpuContext, InitError};
use particles::{Allocation, Kernels, ParticleStore};

/// Whatever drives the animation loop. The layer asks for another frame after every frame it
/// draws; the host has no clock of its own.
pub trait RepaintHandle {
    fn request_repaint(&self);
}

impl RepaintHandle for winit::window::Window {
    fn request_repaint(&self) {
        self.request_redraw();
    }
}

/// What `SnowLayer::initialize` ended up with.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Running,
    /// The GPU can't run the layer. Every later call is a silent no-op.
    Inert,
}

enum State {
    Uninitialized,
    Inert,
    Running(Box<Running>),
    Removed,
}

struct Running {
    gpu: GpuContext,
    store: ParticleStore,

    kernels: Kernels,
    billboard: billboard::Pipeline,
    fog: fog::Pipeline,

    fps: FpsMeter,
    frame: u32,
    /// Whether the fog pass should run this frame.
    draw_fog: bool,
    /// Whether `prerender` has written uniforms since the last `render`.
    prepared: bool,
}

/// The snow layer. Owns every GPU resource it creates; the host only lends it a device and a
/// color target.
pub struct SnowLayer {
    options: SnowOptions,
    state: State,
}

impl SnowLayer {
    pub fn new(options: SnowOptions) -> Self {
        Self {
            options,
            state: State::Uninitialized,
        }
    }

    /// Brings the layer up on the acquired context. A failed acquisition, or a device that
    /// can't run the kernels, leaves the layer permanently inert; only failing to create GPU
    /// resources on a capable device is an error. There are no retries: once inert or running,
    /// this returns the current readiness without doing anything.
    pub async fn initialize(
        &mut self,
        acquired: Result<GpuContext, CapabilityError>,
        target_format: wgpu::TextureFormat,
    ) -> Result<Readiness, InitError> {
        match self.state {
            State::Uninitialized => {}
            State::Running(_) => return Ok(Readiness::Running),
            State::Inert | State::Removed => return Ok(Readiness::Inert),
        }

        let gpu = match acquired.and_then(|gpu| gpu.probe().map(|()| gpu)) {
            Ok(gpu) => gpu,
            Err(err) => {
                self.disable(err);
                return Ok(Readiness::Inert);
            }
        };

        let allocation = Allocation::new(self.options.particle_count(), 0, glam::Vec2::ZERO);
        gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let store = ParticleStore::new(&gpu.device, allocation);
        let kernels = Kernels::new(&gpu.device, &store);
        let billboard = billboard::Pipeline::new(&gpu.device, target_format, &store);
        let fog = fog::Pipeline::new(&gpu.device, target_format);
        if let Some(err) = gpu.device.pop_error_scope().await {
            return Err(InitError::ResourceCreation(err.to_string()));
        }

        log::info!("Snow layer running with {} particles", store.count());
        self.state = State::Running(Box::new(Running {
            gpu,
            store,
            kernels,
            billboard,
            fog,
            fps: FpsMeter::new(),
            frame: 0,
            draw_fog: false,
            prepared: false,
        }));
        Ok(Readiness::Running)
    }

    fn disable(&mut self, err: CapabilityError) {
        log::warn!("Snow layer disabled: {err}");
        self.state = State::Inert;
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, State::Running(_))
    }

    pub fn options(&self) -> &SnowOptions {
        &self.options
    }

    /// The particle count the current density asks for. The store catches up on the next
    /// `prerender`.
    pub fn particle_count(&self) -> u32 {
        self.options.particle_count()
    }

    /// Particles currently allocated on the GPU, if any.
    pub fn allocated_particles(&self) -> Option<u32> {
        match &self.state {
            State::Running(running) => Some(running.store.count()),
            _ => None,
        }
    }

    pub fn set_options(&mut self, options: SnowOptions) {
        self.options = options;
    }

    /// Changing the particle count rebuilds the store on the next frame.
    pub fn set_density(&mut self, density: f32) {
        self.options.density = density;
    }

    pub fn set_intensity(&mut self, intensity: f32) {
        self.options.intensity = intensity;
    }

    pub fn set_flake_size(&mut self, flake_size: f32) {
        self.options.flake_size = flake_size;
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.options.opacity = opacity;
    }

    pub fn set_wind(&mut self, azimuth: f32, speed: f32) {
        self.options.wind_azimuth = azimuth;
        self.options.wind_speed = speed;
    }

    pub fn set_fog(&mut self, enabled: bool, opacity: f32) {
        self.options.fog = enabled;
        self.options.fog_opacity = opacity;
    }

    pub fn set_color(&mut self, color: [f32; 3]) {
        self.options.color = color;
    }

    /// Reads the camera snapshot, rebuilds the store if the particle count changed, and uploads
    /// this frame's uniforms. Returns whether there is anything to render.
    pub fn prerender(&mut self, camera: &CameraFrame) -> bool {
        let State::Running(running) = &mut self.state else {
            return false;
        };

        let fps = running.fps.tick(camera.elapsed);
        let uniforms = SimulationUniforms::derive(camera, &self.options, fps);
        let center = uniforms.spawn_center;

        let count = self.options.particle_count();
        if let Some(allocation) = running.store.allocation().resized(count, center) {
            // The old store is dropped, and with it its buffers.
            running.store = ParticleStore::new(&running.gpu.device, allocation);
            running.kernels.rebind(&running.gpu.device, &running.store);
            running.billboard.rebind(&running.gpu.device, &running.store);
            log::info!("Rebuilt particle store with {count} particles");
        }

        let allocation = running.store.allocation_mut();
        let origin_shift = allocation.rebase(center);
        let uniforms = uniforms.rebased(allocation.origin());

        let queue = &running.gpu.queue;
        running.kernels.set_params(
            queue,
            &uniforms.sim_params(
                allocation.count(),
                allocation.salts(),
                running.frame,
                origin_shift,
            ),
        );
        running.billboard.set_params(queue, &uniforms.render_params());
        running.draw_fog = uniforms.fog_opacity > 0.0;
        if running.draw_fog {
            running.fog.set_params(queue, &uniforms.fog_params());
        }

        running.prepared = true;
        true
    }

    /// Advances and draws the particles on top of whatever `target` already holds, then asks
    /// the host for the next frame. Does nothing unless `prerender` ran first.
    pub fn render(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        repaint: &impl RepaintHandle,
    ) {
        let State::Running(running) = &mut self.state else {
            return;
        };
        if !running.prepared {
            return;
        }

        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("snow_compute_pass"),
                timestamp_writes: None,
            });

            let spawn = running.store.allocation_mut().advance();
            running
                .kernels
                .compute_pass(&mut compute_pass, &running.store, spawn);
        }

        {
            // Load, not clear: the host's map is already in the target
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("snow_render_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            running.billboard.render_pass(&mut render_pass, &running.store);
            if running.draw_fog {
                running.fog.render_pass(&mut render_pass);
            }
        }

        running.frame = running.frame.wrapping_add(1);
        running.prepared = false;
        repaint.request_repaint();
    }

    /// Tears the layer down: every buffer is destroyed and no more frames are requested.
    pub fn remove(&mut self) {
        if let State::Running(running) = std::mem::replace(&mut self.state, State::Removed) {
            running.kernels.destroy();
            running.billboard.destroy();
            running.fog.destroy();
            // Dropping the store destroys the particle buffers.
            drop(running);
            log::info!("Snow layer removed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{MAX_PARTICLES, MIN_PARTICLES};
    use crate::graphics::camera::Projection;

    fn camera() -> CameraFrame {
        CameraFrame {
            projection: Projection::Georeferenced(glam::Mat4::IDENTITY),
            viewport: glam::vec2(800.0, 600.0),
            center: glam::vec2(0.5, 0.5),
            zoom: 10.0,
            bearing: 0.0,
            elapsed: 0.0,
        }
    }

    fn inert_layer() -> SnowLayer {
        let mut layer = SnowLayer::new(SnowOptions::default());
        let readiness = pollster::block_on(
            layer.initialize(Err(CapabilityError::NoAdapter), wgpu::TextureFormat::Bgra8UnormSrgb),
        );
        assert_eq!(readiness, Ok(Readiness::Inert));
        layer
    }

    #[test]
    fn failed_acquisition_leaves_layer_inert() {
        let mut layer = inert_layer();
        assert!(!layer.is_running());
        assert_eq!(layer.allocated_particles(), None);
        for i in 0..5 {
            let frame = CameraFrame {
                elapsed: i as f64 / 60.0,
                ..camera()
            };
            assert!(!layer.prerender(&frame));
        }
        assert_eq!(layer.allocated_particles(), None);
    }

    #[test]
    fn inert_layer_does_not_retry() {
        let mut layer = inert_layer();
        // Even a second attempt reports inert without looking at what it was given.
        let readiness = pollster::block_on(layer.initialize(
            Err(CapabilityError::MissingFeature("compute shaders")),
            wgpu::TextureFormat::Rgba8Unorm,
        ));
        assert_eq!(readiness, Ok(Readiness::Inert));
        assert!(!layer.is_running());
    }

    #[test]
    fn uninitialized_layer_draws_nothing() {
        let mut layer = SnowLayer::new(SnowOptions::default());
        assert!(!layer.prerender(&camera()));
        assert_eq!(layer.allocated_particles(), None);
    }

    #[test]
    fn removed_layer_stays_down() {
        let mut layer = SnowLayer::new(SnowOptions::default());
        layer.remove();
        let readiness = pollster::block_on(
            layer.initialize(Err(CapabilityError::NoAdapter), wgpu::TextureFormat::Rgba8Unorm),
        );
        assert_eq!(readiness, Ok(Readiness::Inert));
        assert!(!layer.prerender(&camera()));
    }

    #[test]
    fn setters_apply_without_a_gpu() {
        let mut layer = inert_layer();
        layer.set_intensity(0.9);
        layer.set_flake_size(6.0);
        layer.set_opacity(0.4);
        layer.set_wind(45.0, 80.0);
        layer.set_fog(false, 0.7);
        layer.set_color([0.8, 0.9, 1.0]);

        let options = layer.options();
        assert_eq!(options.intensity, 0.9);
        assert_eq!(options.flake_size, 6.0);
        assert_eq!(options.opacity, 0.4);
        assert_eq!((options.wind_azimuth, options.wind_speed), (45.0, 80.0));
        assert!(!options.fog);
        assert_eq!(options.color, [0.8, 0.9, 1.0]);
    }

    #[test]
    fn density_sets_particle_count() {
        let mut layer = SnowLayer::new(SnowOptions::default());
        layer.set_density(0.0);
        assert_eq!(layer.particle_count(), MIN_PARTICLES);
        layer.set_density(1.0);
        assert_eq!(layer.particle_count(), MAX_PARTICLES);
        layer.set_density(0.25);
        let expected =
            (MIN_PARTICLES as f32 + 0.25 * (MAX_PARTICLES - MIN_PARTICLES) as f32).round() as u32;
        assert_eq!(layer.particle_count(), expected);
    }
}
