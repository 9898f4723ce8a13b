//! Generates typed bindings for every shader under `src/shaders/`. Each module ends up in
//! `OUT_DIR/<name>.rs` and is pulled in by `src/shaders/mod.rs`.

use std::path::PathBuf;

use wgsl_to_wgpu::{MatrixVectorTypes, WriteOptions, create_shader_module};

const SHADERS: &[(&str, &str)] = &[
    ("particles_shader", "src/shaders/particles.wgsl"),
    ("billboard_shader", "src/shaders/billboard.wgsl"),
    ("fog_shader", "src/shaders/fog.wgsl"),
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = PathBuf::from(std::env::var("OUT_DIR")?);
    let manifest_dir = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR")?);

    for (name, path) in SHADERS {
        println!("cargo:rerun-if-changed={path}");

        let wgsl_path = manifest_dir.join(path);
        let wgsl_source = std::fs::read_to_string(&wgsl_path)?;
        // The include path is absolute since the generated file lives in OUT_DIR, not next to
        // the shader source.
        let text = create_shader_module(
            &wgsl_source,
            &wgsl_path.to_string_lossy(),
            WriteOptions {
                derive_bytemuck_host_shareable: true,
                matrix_vector_types: MatrixVectorTypes::Glam,
                ..Default::default()
            },
        )
        .map_err(|err| format!("{path}: {err:?}"))?;
        std::fs::write(out_dir.join(format!("{name}.rs")), text.as_bytes())?;
    }

    Ok(())
}
