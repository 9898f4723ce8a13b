//! Typed bindings for the WGSL shaders, generated by `build.rs` with `wgsl_to_wgpu`.

#![allow(dead_code, clippy::all)]

pub mod particles_shader {
    include!(concat!(env!("OUT_DIR"), "/particles_shader.rs"));
}

pub mod billboard_shader {
    include!(concat!(env!("OUT_DIR"), "/billboard_shader.rs"));
}

pub mod fog_shader {
    include!(concat!(env!("OUT_DIR"), "/fog_shader.rs"));
}
