//! The camera snapshot the host hands over every frame, plus a small map camera the demo host
//! uses to produce one.

use glam::{Mat4, Vec2, Vec3};

use crate::constants::TILE_SIZE;

/// How particles get from world space onto the screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// World units are projected with the host's world-to-clip matrix, so flakes stay anchored
    /// to the map.
    Georeferenced(Mat4),
    /// No matrix from the host. Particles live in a screen-aligned pixel frame rotated by the
    /// camera bearing.
    ScreenSpace,
}

/// Immutable per-frame snapshot of the host camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFrame {
    pub projection: Projection,
    /// Logical pixels.
    pub viewport: Vec2,
    /// World units.
    pub center: Vec2,
    pub zoom: f32,
    /// Degrees, clockwise.
    pub bearing: f32,
    /// Seconds since the host started animating.
    pub elapsed: f64,
}

pub const MAX_ZOOM: f32 = 22.0;
pub const MAX_PITCH: f32 = 60.0;

/// Vertical field of view, the same one most web map renderers use.
const FOV_Y: f32 = 0.643_501_1;

/// A pannable, zoomable, rotatable and tiltable camera over a normalized world where
/// `(0, 0)` is the north-west corner, `(1, 1)` the south-east corner, and y grows south.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapCamera {
    pub center: Vec2,
    pub zoom: f32,
    /// Degrees, clockwise.
    pub bearing: f32,
    /// Degrees away from looking straight down.
    pub pitch: f32,
}

impl Default for MapCamera {
    fn default() -> Self {
        Self {
            center: Vec2::splat(0.5),
            zoom: 13.0,
            bearing: 0.0,
            pitch: 0.0,
        }
    }
}

impl MapCamera {
    /// World units per logical pixel.
    pub fn pixel_to_world(&self) -> f32 {
        1.0 / self.world_size()
    }

    fn world_size(&self) -> f32 {
        TILE_SIZE * self.zoom.exp2()
    }

    /// Moves the center by a screen-space offset in logical pixels, x right and y down.
    pub fn pan(&mut self, pixels: Vec2) {
        let rotated = Vec2::from_angle(self.bearing.to_radians()).rotate(pixels);
        self.center = (self.center + rotated * self.pixel_to_world()).clamp(Vec2::ZERO, Vec2::ONE);
    }

    pub fn zoom_by(&mut self, delta: f32) {
        self.zoom = (self.zoom + delta).clamp(0.0, MAX_ZOOM);
    }

    pub fn rotate_by(&mut self, degrees: f32) {
        self.bearing = (self.bearing + degrees).rem_euclid(360.0);
    }

    pub fn pitch_by(&mut self, degrees: f32) {
        self.pitch = (self.pitch + degrees).clamp(0.0, MAX_PITCH);
    }

    /// Perspective world-to-clip transform with wgpu's [0, 1] depth range. Altitude (world z)
    /// points towards the camera and uses the same units as x and y.
    pub fn world_to_clip(&self, viewport: Vec2) -> Mat4 {
        let viewport = viewport.max(Vec2::ONE);
        let camera_distance = 0.5 * viewport.y / (0.5 * FOV_Y).tan();
        let world_size = self.world_size();

        let projection = Mat4::perspective_rh(
            FOV_Y,
            viewport.x / viewport.y,
            camera_distance * 0.05,
            camera_distance * 4.0,
        );
        // Scale world units to pixels, flip y so north is up, then bearing, pitch and finally
        // back the camera away from the center.
        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -camera_distance))
            * Mat4::from_rotation_x(-self.pitch.to_radians())
            * Mat4::from_rotation_z(self.bearing.to_radians())
            * Mat4::from_scale(Vec3::new(world_size, -world_size, world_size))
            * Mat4::from_translation(-self.center.extend(0.0));

        projection * view
    }

    pub fn frame(&self, viewport: Vec2, elapsed: f64, projection: ProjectionKind) -> CameraFrame {
        CameraFrame {
            projection: match projection {
                ProjectionKind::Georeferenced => {
                    Projection::Georeferenced(self.world_to_clip(viewport))
                }
                ProjectionKind::ScreenSpace => Projection::ScreenSpace,
            },
            viewport,
            center: self.center,
            zoom: self.zoom,
            bearing: self.bearing,
            elapsed,
        }
    }
}

/// Which `Projection` variant a host wants to hand out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionKind {
    Georeferenced,
    ScreenSpace,
}
