//! The public option set of the layer, in a format that is amenable to being put in JSON.

use crate::constants::{MAX_FLAKE_SIZE, MAX_PARTICLES, MIN_FLAKE_SIZE, MIN_PARTICLES};

/// Every knob the host can turn. Values are stored exactly as given; out-of-range values are
/// clamped where they are used, never rejected.
#[derive(Debug, Clone, PartialEq, facet::Facet)]
pub struct SnowOptions {
    /// 0..1, mapped onto `MIN_PARTICLES..=MAX_PARTICLES`.
    pub density: f32,
    /// 0..1, scales how fast flakes fall.
    pub intensity: f32,
    /// Flake diameter in logical pixels.
    pub flake_size: f32,
    /// 0..1
    pub opacity: f32,
    /// Direction the wind blows towards, in degrees. 0 points down the screen.
    pub wind_azimuth: f32,
    /// Wind speed in logical pixels per second.
    pub wind_speed: f32,
    pub fog: bool,
    /// 0..1
    pub fog_opacity: f32,
    /// Linear RGB, each channel 0..1.
    pub color: [f32; 3],
}

impl Default for SnowOptions {
    fn default() -> Self {
        Self {
            density: 0.5,
            intensity: 0.5,
            flake_size: 3.0,
            opacity: 0.9,
            wind_azimuth: 0.0,
            wind_speed: 20.0,
            fog: true,
            fog_opacity: 0.25,
            color: [1.0, 1.0, 1.0],
        }
    }
}

/// Clamps to 0..1, mapping NaN to 0.
fn unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

impl SnowOptions {
    pub fn clamped_density(&self) -> f32 {
        unit(self.density)
    }

    pub fn clamped_intensity(&self) -> f32 {
        unit(self.intensity)
    }

    pub fn clamped_opacity(&self) -> f32 {
        unit(self.opacity)
    }

    pub fn clamped_fog_opacity(&self) -> f32 {
        unit(self.fog_opacity)
    }

    pub fn clamped_flake_size(&self) -> f32 {
        if self.flake_size.is_nan() {
            MIN_FLAKE_SIZE
        } else {
            self.flake_size.clamp(MIN_FLAKE_SIZE, MAX_FLAKE_SIZE)
        }
    }

    pub fn clamped_wind_speed(&self) -> f32 {
        if self.wind_speed.is_finite() {
            self.wind_speed.max(0.0)
        } else {
            0.0
        }
    }

    pub fn clamped_color(&self) -> glam::Vec3 {
        glam::Vec3::from_array(self.color.map(unit))
    }

    /// How many particles this option set asks for.
    pub fn particle_count(&self) -> u32 {
        particle_count_for_density(self.density)
    }

    /// A handful of hand-tuned looks, used when there is no presets file.
    pub fn builtin_presets() -> Vec<SnowOptions> {
        vec![
            SnowOptions::default(),
            // Light flurry
            SnowOptions {
                density: 0.15,
                intensity: 0.2,
                flake_size: 4.0,
                opacity: 0.8,
                wind_azimuth: 30.0,
                wind_speed: 10.0,
                fog: false,
                ..SnowOptions::default()
            },
            // Blizzard
            SnowOptions {
                density: 1.0,
                intensity: 1.0,
                flake_size: 2.5,
                opacity: 1.0,
                wind_azimuth: 70.0,
                wind_speed: 140.0,
                fog: true,
                fog_opacity: 0.55,
                color: [0.92, 0.95, 1.0],
            },
        ]
    }
}

/// `round(MIN + clamp(density) * (MAX - MIN))`. Density 0 still yields `MIN_PARTICLES`.
pub fn particle_count_for_density(density: f32) -> u32 {
    let span = (MAX_PARTICLES - MIN_PARTICLES) as f32;
    MIN_PARTICLES + (unit(density) * span).round() as u32
}
