/// MUST exactly match `@workgroup_size` in particles.wgsl
pub const WORK_GROUP_SIZE: u32 = 64;

/// Particle count at density 0. The layer never runs with fewer particles than this.
pub const MIN_PARTICLES: u32 = 2_000;
/// Particle count at density 1.
pub const MAX_PARTICLES: u32 = 120_000;

/// Size in pixels of one world unit at zoom 0.
pub const TILE_SIZE: f32 = 512.0;

/// Half span of the spawn box, as a multiple of half the viewport diagonal.
pub const SPAWN_BOX_SCALE: f32 = 1.5;
/// Height of the spawn box relative to its horizontal extent.
pub const ALTITUDE_RATIO: f32 = 0.25;

/// Fall rate in altitude spans per second, at intensity 0 and 1.
pub const MIN_FALL_RATE: f32 = 0.08;
pub const MAX_FALL_RATE: f32 = 0.6;

pub const DEFAULT_FPS: f32 = 60.0;
pub const MIN_FPS: f32 = 10.0;
pub const MAX_FPS: f32 = 240.0;
/// Weight of the newest sample in the fps moving average.
pub const FPS_SMOOTHING: f32 = 0.1;

/// Flake diameter range, in logical pixels.
pub const MIN_FLAKE_SIZE: f32 = 0.5;
pub const MAX_FLAKE_SIZE: f32 = 64.0;

/// Width of the fog vignette edge, in normalized radius.
pub const FOG_FALLOFF: f32 = 0.6;
