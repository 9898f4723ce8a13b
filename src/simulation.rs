//! CPU rendition of the kernels in particles.wgsl.
//!
//! Nothing here is used to draw frames; the GPU does all of that. These functions perform the
//! exact same `u32`/`f32` operations as the WGSL so the particle model can be checked without a
//! GPU. Any change to the shader MUST be mirrored here.

use glam::{Vec3, Vec4};

use crate::shaders::particles_shader::SimParams;

/// One slot of the particle store, as laid out in the two storage buffers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    /// x, y relative to the store origin, altitude.
    pub position: Vec3,
    /// Reserved drift x, reserved drift y, speed multiplier, seed.
    pub velocity_seed: Vec4,
}

impl Particle {
    pub fn altitude(&self) -> f32 {
        self.position.z
    }

    pub fn speed_mul(&self) -> f32 {
        self.velocity_seed.z
    }

    pub fn seed(&self) -> f32 {
        self.velocity_seed.w
    }
}

/// PCG hash, see "Hash Functions for GPU Rendering" (Jarzynski & Olano).
pub fn pcg(v: u32) -> u32 {
    let state = v.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277_803_737);
    (word >> 22) ^ word
}

/// Uniform in [0, 1). Only the top 24 bits are used so the result is exact in f32.
pub fn hash01(index: u32, salt: u32) -> f32 {
    (pcg(index ^ pcg(salt)) >> 8) as f32 / 16_777_216.0
}

fn in_box(r: f32, center: f32, half_span: f32) -> f32 {
    center + r * 2.0 * half_span - half_span
}

pub fn spawn(index: u32, params: &SimParams) -> Particle {
    let r1 = hash01(index, params.salts.x);
    let r2 = hash01(index, params.salts.y);
    let r3 = hash01(index, params.salts.z);
    let r4 = hash01(index, params.salts.w);

    Particle {
        position: Vec3::new(
            in_box(r1, params.center.x, params.half_span),
            in_box(r2, params.center.y, params.half_span),
            r3 * params.alt_span,
        ),
        velocity_seed: Vec4::new(0.0, 0.0, r4 * 0.5 + 0.5, r4),
    }
}

pub fn update(index: u32, particle: Particle, params: &SimParams) -> Particle {
    let mut p = particle.position;

    p.x = p.x - params.origin_shift.x + params.wind_delta.x;
    p.y = p.y - params.origin_shift.y + params.wind_delta.y;
    p.z -= params.fall_per_frame * particle.speed_mul();

    if p.z < 0.0 {
        let salt_x = params.salts.x ^ params.respawn_seed;
        let salt_y = params.salts.y ^ params.respawn_seed;
        p.x = in_box(hash01(index, salt_x), params.center.x, params.half_span);
        p.y = in_box(hash01(index, salt_y), params.center.y, params.half_span);
        p.z = params.alt_span;
    }

    Particle {
        position: p,
        velocity_seed: particle.velocity_seed,
    }
}
