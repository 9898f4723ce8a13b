//! Turns the host's camera snapshot and the option set into the uniforms both kernels and the
//! draw call read.

use glam::{DMat4, Mat4, Vec2, Vec3, Vec4};

use crate::constants::*;
use crate::fs::SnowOptions;
use crate::graphics::camera::{CameraFrame, Projection};
use crate::shaders::{billboard_shader, fog_shader, particles_shader};
use crate::simulation::pcg;

/// Smoothed frame rate, measured from the host's elapsed time.
#[derive(Debug, Clone)]
pub struct FpsMeter {
    last_elapsed: Option<f64>,
    fps: Option<f32>,
}

impl Default for FpsMeter {
    fn default() -> Self {
        Self::new()
    }
}

impl FpsMeter {
    pub fn new() -> Self {
        Self {
            last_elapsed: None,
            fps: None,
        }
    }

    /// Feeds one frame's timestamp. Timestamps that don't move forward are ignored.
    pub fn tick(&mut self, elapsed: f64) -> f32 {
        if let Some(last) = self.last_elapsed
            && elapsed > last
        {
            let sample = ((1.0 / (elapsed - last)) as f32).clamp(MIN_FPS, MAX_FPS);
            self.fps = Some(match self.fps {
                Some(fps) => fps + (sample - fps) * FPS_SMOOTHING,
                None => sample,
            });
        }
        if self.last_elapsed.is_none_or(|last| elapsed > last) {
            self.last_elapsed = Some(elapsed);
        }
        self.fps()
    }

    pub fn fps(&self) -> f32 {
        self.fps.unwrap_or(DEFAULT_FPS)
    }
}

/// `1 / (TILE_SIZE * 2^zoom)`
pub fn pixel_to_world(zoom: f32) -> f32 {
    1.0 / (TILE_SIZE * zoom.exp2())
}

/// Wind displacement per frame in world units. `azimuth` and `bearing` are in degrees, an
/// azimuth of 0 blows straight down the screen.
pub fn wind_delta(azimuth: f32, speed: f32, pixel_to_world: f32, fps: f32, bearing: f32) -> Vec2 {
    let angle = (azimuth - bearing).to_radians();
    let magnitude = speed / fps * pixel_to_world;
    Vec2::new(angle.sin(), angle.cos()) * magnitude
}

/// Fall rate in altitude spans per second for an intensity in 0..1.
fn fall_rate(intensity: f32) -> f32 {
    MIN_FALL_RATE + (MAX_FALL_RATE - MIN_FALL_RATE) * intensity
}

/// Pixel frame rotated by `bearing` straight to clip space: x right, y down, constant depth.
fn screen_space_to_clip(viewport: Vec2, bearing: f32) -> Mat4 {
    Mat4::from_translation(Vec3::new(0.0, 0.0, 0.5))
        * Mat4::from_scale(Vec3::new(2.0 / viewport.x, -2.0 / viewport.y, 0.0))
        * Mat4::from_rotation_z(-bearing.to_radians())
}

/// Everything derived for a single frame. Nothing here outlives the frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationUniforms {
    pub spawn_center: Vec2,
    pub half_span: f32,
    pub alt_span: f32,
    pub fall_per_frame: f32,
    pub wind_delta: Vec2,
    pub world_to_clip: Mat4,
    pub viewport: Vec2,
    /// Logical pixels.
    pub flake_radius: f32,
    pub color: Vec3,
    pub opacity: f32,
    /// Zero when fog is disabled.
    pub fog_opacity: f32,
}

impl SimulationUniforms {
    pub fn derive(frame: &CameraFrame, options: &SnowOptions, fps: f32) -> Self {
        let viewport = frame.viewport.max(Vec2::ONE);
        let (world_to_clip, spawn_center, pixel_to_world) = match frame.projection {
            Projection::Georeferenced(matrix) => {
                (matrix, frame.center, pixel_to_world(frame.zoom))
            }
            Projection::ScreenSpace => (
                screen_space_to_clip(viewport, frame.bearing),
                Vec2::ZERO,
                1.0,
            ),
        };

        let half_span = 0.5 * viewport.length() * SPAWN_BOX_SCALE * pixel_to_world;
        let alt_span = 2.0 * half_span * ALTITUDE_RATIO;
        let fps = fps.clamp(MIN_FPS, MAX_FPS);

        Self {
            spawn_center,
            half_span,
            alt_span,
            fall_per_frame: alt_span * fall_rate(options.clamped_intensity()) / fps,
            wind_delta: wind_delta(
                options.wind_azimuth,
                options.clamped_wind_speed(),
                pixel_to_world,
                fps,
                frame.bearing,
            ),
            world_to_clip,
            viewport,
            flake_radius: options.clamped_flake_size() * 0.5,
            color: options.clamped_color(),
            opacity: options.clamped_opacity(),
            fog_opacity: if options.fog {
                options.clamped_fog_opacity()
            } else {
                0.0
            },
        }
    }

    /// Moves the world origin to `origin`: the spawn center becomes relative to it and the
    /// world-to-clip transform takes origin-relative positions. Particle x/y stay small this
    /// way, so f32 keeps its precision at every zoom level.
    pub fn rebased(self, origin: Vec2) -> Self {
        // In f64: the matrix translation and `origin` nearly cancel.
        let to_origin = DMat4::from_translation(origin.as_dvec2().extend(0.0));
        Self {
            spawn_center: self.spawn_center - origin,
            world_to_clip: (self.world_to_clip.as_dmat4() * to_origin).as_mat4(),
            ..self
        }
    }

    pub fn sim_params(
        &self,
        particle_count: u32,
        salts: [u32; 4],
        frame: u32,
        origin_shift: Vec2,
    ) -> particles_shader::SimParams {
        particles_shader::SimParams {
            center: self.spawn_center,
            wind_delta: self.wind_delta,
            origin_shift,
            half_span: self.half_span,
            alt_span: self.alt_span,
            fall_per_frame: self.fall_per_frame,
            particle_count,
            respawn_seed: pcg(frame),
            padding: 0,
            salts: glam::UVec4::from_array(salts),
        }
    }

    pub fn render_params(&self) -> billboard_shader::RenderParams {
        billboard_shader::RenderParams {
            world_to_clip: self.world_to_clip,
            color: self.color.extend(self.opacity),
            viewport: self.viewport,
            flake_radius: self.flake_radius,
            alt_span: self.alt_span,
        }
    }

    pub fn fog_params(&self) -> fog_shader::FogParams {
        fog_shader::FogParams {
            color: Vec4::from((self.color, 1.0)),
            viewport: self.viewport,
            opacity: self.fog_opacity,
            falloff: FOG_FALLOFF,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::camera::{MapCamera, ProjectionKind};
    use crate::simulation;

    fn frame(zoom: f32) -> CameraFrame {
        CameraFrame {
            projection: Projection::Georeferenced(Mat4::IDENTITY),
            viewport: glam::vec2(1024.0, 768.0),
            center: glam::vec2(0.3, 0.6),
            zoom,
            bearing: 0.0,
            elapsed: 0.0,
        }
    }

    #[test]
    fn wind_at_azimuth_zero_is_all_y() {
        let fps = 60.0;
        let delta = wind_delta(0.0, 50.0, pixel_to_world(13.0), fps, 0.0);
        let magnitude = 50.0 / 60.0 / (512.0 * 8192.0);
        assert!((delta.y - magnitude).abs() <= magnitude * 1e-6);
        assert!(delta.x.abs() <= magnitude * 1e-6);
    }

    #[test]
    fn wind_accounts_for_bearing() {
        // Blowing towards screen right while the map faces east: the wind goes south.
        let delta = wind_delta(90.0, 10.0, 1.0, 10.0, 90.0);
        assert!(delta.x.abs() < 1e-6);
        assert!((delta.y - 1.0).abs() < 1e-6);

        let delta = wind_delta(90.0, 10.0, 1.0, 10.0, 0.0);
        assert!((delta.x - 1.0).abs() < 1e-6);
    }

    #[test]
    fn pixel_to_world_halves_per_zoom_level() {
        assert_eq!(pixel_to_world(0.0), 1.0 / 512.0);
        assert_eq!(pixel_to_world(1.0), pixel_to_world(0.0) / 2.0);
    }

    #[test]
    fn spawn_box_shrinks_with_zoom() {
        let options = SnowOptions::default();
        let near = SimulationUniforms::derive(&frame(15.0), &options, 60.0);
        let far = SimulationUniforms::derive(&frame(12.0), &options, 60.0);
        assert!((far.half_span / near.half_span - 8.0).abs() < 1e-4);
        assert!((far.alt_span / near.alt_span - 8.0).abs() < 1e-4);
        // Same number of pixels covered either way.
        let pixels = near.half_span / pixel_to_world(15.0);
        assert!((pixels - 0.5 * 1280.0 * SPAWN_BOX_SCALE).abs() < 0.1);
        assert_eq!(near.spawn_center, glam::vec2(0.3, 0.6));
    }

    #[test]
    fn intensity_scales_fall() {
        let calm = SimulationUniforms::derive(
            &frame(13.0),
            &SnowOptions {
                intensity: 0.0,
                ..SnowOptions::default()
            },
            60.0,
        );
        let storm = SimulationUniforms::derive(
            &frame(13.0),
            &SnowOptions {
                intensity: 3.0,
                ..SnowOptions::default()
            },
            60.0,
        );
        let expected = MAX_FALL_RATE / MIN_FALL_RATE;
        assert!((storm.fall_per_frame / calm.fall_per_frame - expected).abs() < 1e-3);
        assert!((storm.fall_per_frame * 60.0 / storm.alt_span - MAX_FALL_RATE).abs() < 1e-5);
    }

    #[test]
    fn fog_opacity_is_zero_when_disabled() {
        let options = SnowOptions {
            fog: false,
            fog_opacity: 0.8,
            ..SnowOptions::default()
        };
        let uniforms = SimulationUniforms::derive(&frame(13.0), &options, 60.0);
        assert_eq!(uniforms.fog_opacity, 0.0);
        assert_eq!(uniforms.fog_params().opacity, 0.0);
    }

    #[test]
    fn screen_space_uses_pixels_around_origin() {
        let frame = CameraFrame {
            projection: Projection::ScreenSpace,
            bearing: 0.0,
            ..frame(13.0)
        };
        let uniforms = SimulationUniforms::derive(&frame, &SnowOptions::default(), 60.0);
        assert_eq!(uniforms.spawn_center, Vec2::ZERO);
        assert!((uniforms.half_span - 0.5 * 1280.0 * SPAWN_BOX_SCALE).abs() < 0.1);

        // 100 px right and 100 px down of center.
        let ndc = uniforms
            .world_to_clip
            .project_point3(Vec3::new(100.0, 100.0, 7.0));
        assert!((ndc.x - 200.0 / 1024.0).abs() < 1e-6);
        assert!((ndc.y + 200.0 / 768.0).abs() < 1e-6);
        assert_eq!(ndc.z, 0.5);
    }

    #[test]
    fn fps_meter_smooths_and_clamps() {
        let mut meter = FpsMeter::new();
        assert_eq!(meter.tick(1.0), DEFAULT_FPS);
        // First real sample is taken as is.
        assert!((meter.tick(1.0 + 1.0 / 30.0) - 30.0).abs() < 1e-3);
        // Time going backwards is ignored.
        assert!((meter.tick(0.5) - 30.0).abs() < 1e-3);
        // A huge stall is clamped before it is averaged in.
        let after_stall = meter.tick(100.0);
        assert!((after_stall - (30.0 + (MIN_FPS - 30.0) * FPS_SMOOTHING)).abs() < 1e-3);
    }

    #[test]
    fn sim_params_carry_frame_state() {
        let uniforms = SimulationUniforms::derive(&frame(13.0), &SnowOptions::default(), 60.0);
        let shift = glam::vec2(1e-6, -2e-6);
        let a = uniforms.sim_params(10, [1, 3, 5, 7], 0, shift);
        let b = uniforms.sim_params(10, [1, 3, 5, 7], 1, shift);
        assert_ne!(a.respawn_seed, b.respawn_seed);
        assert_eq!(a.salts, glam::uvec4(1, 3, 5, 7));
        assert_eq!(a.half_span, uniforms.half_span);
        assert_eq!(a.origin_shift, shift);
    }

    #[test]
    fn rebasing_keeps_points_on_screen() {
        let camera = MapCamera {
            center: glam::vec2(0.7, 0.6),
            zoom: 2.0,
            bearing: 30.0,
            pitch: 40.0,
        };
        let viewport = glam::vec2(1024.0, 768.0);
        let frame = camera.frame(viewport, 0.0, ProjectionKind::Georeferenced);
        let uniforms = SimulationUniforms::derive(&frame, &SnowOptions::default(), 60.0);
        let origin = glam::vec2(0.69, 0.61);
        let rebased = uniforms.clone().rebased(origin);

        assert!((rebased.spawn_center - glam::vec2(0.01, -0.01)).length() < 1e-6);
        for offset in [Vec3::ZERO, Vec3::new(2e-4, -1e-4, 5e-5), Vec3::new(-3e-4, 0.0, 1e-4)] {
            let absolute = uniforms
                .world_to_clip
                .project_point3(origin.extend(0.0) + offset);
            let relative = rebased.world_to_clip.project_point3(offset);
            let pixels = (absolute.truncate() - relative.truncate()) * viewport * 0.5;
            assert!(pixels.length() < 0.01, "{pixels}");
        }
    }

    #[test]
    fn wind_moves_particles_at_high_zoom() {
        let center = glam::vec2(0.7, 0.6);
        let options = SnowOptions {
            wind_azimuth: 90.0,
            wind_speed: 50.0,
            ..SnowOptions::default()
        };
        let camera = CameraFrame {
            center,
            ..frame(18.0)
        };
        let uniforms = SimulationUniforms::derive(&camera, &options, 60.0).rebased(center);
        let salts = [0x9e37_79b9, 0x85eb_ca6b, 0xc2b2_ae35, 0x27d4_eb2f];
        let params = uniforms.sim_params(20_000, salts, 0, Vec2::ZERO);

        let particles: Vec<_> = (0..params.particle_count)
            .map(|i| simulation::spawn(i, &params))
            .collect();

        // Flakes fill the box instead of collapsing onto a few columns.
        let mut columns: Vec<u32> = particles.iter().map(|p| p.position.x.to_bits()).collect();
        columns.sort_unstable();
        columns.dedup();
        assert!(columns.len() > 19_000, "{} distinct columns", columns.len());

        for (i, before) in particles.iter().enumerate() {
            let after = simulation::update(i as u32, *before, &params);
            if after.altitude() == params.alt_span {
                continue;
            }
            assert!(after.position.x > before.position.x, "particle {i} did not move");
        }
    }
}
