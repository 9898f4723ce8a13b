//! Draws every particle as a fixed-pixel-size, screen-facing disc.

use glam::Vec3;

use crate::graphics::particles::ParticleStore;
use crate::shaders::billboard_shader as render_shader;

pub struct Pipeline {
    render_params_buffer: wgpu::Buffer,
    params_bind_group: render_shader::bind_groups::BindGroup0,
    particles_bind_group: render_shader::bind_groups::BindGroup1,
    render_pipeline: wgpu::RenderPipeline,
}

impl Pipeline {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        store: &ParticleStore,
    ) -> Self {
        let render_params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("render_params_buffer"),
            size: size_of::<render_shader::RenderParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        // Written every frame, the matrix changes with the camera

        let params_bind_group = render_shader::bind_groups::BindGroup0::from_bindings(
            device,
            render_shader::bind_groups::BindGroupLayout0 {
                params: render_params_buffer.as_entire_buffer_binding(),
            },
        );
        let particles_bind_group = Self::particles_bind_group(device, store);

        let render_shader_module = render_shader::create_shader_module(device);
        let render_pipeline_layout = render_shader::create_pipeline_layout(device);
        let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("billboard render pipeline"),
            layout: Some(&render_pipeline_layout),
            vertex: render_shader::vertex_state(&render_shader_module, &render_shader::vs_entry()),
            fragment: Some(render_shader::fragment_state(
                &render_shader_module,
                &render_shader::fs_entry([Some(wgpu::ColorTargetState {
                    format: surface_format,
                    // The fragment shader outputs premultiplied color
                    blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })]),
            )),
            primitive: Default::default(),
            depth_stencil: Default::default(),
            multisample: Default::default(),
            multiview: Default::default(),
            cache: Default::default(),
        });

        Self {
            render_params_buffer,
            params_bind_group,
            particles_bind_group,
            render_pipeline,
        }
    }

    fn particles_bind_group(
        device: &wgpu::Device,
        store: &ParticleStore,
    ) -> render_shader::bind_groups::BindGroup1 {
        render_shader::bind_groups::BindGroup1::from_bindings(
            device,
            render_shader::bind_groups::BindGroupLayout1 {
                positions: store.positions().as_entire_buffer_binding(),
            },
        )
    }

    pub fn rebind(&mut self, device: &wgpu::Device, store: &ParticleStore) {
        self.particles_bind_group = Self::particles_bind_group(device, store);
    }

    pub fn set_params(&self, queue: &wgpu::Queue, params: &render_shader::RenderParams) {
        queue.write_buffer(&self.render_params_buffer, 0, bytemuck::bytes_of(params));
    }

    pub fn render_pass(&self, render_pass: &mut wgpu::RenderPass, store: &ParticleStore) {
        render_pass.set_pipeline(&self.render_pipeline);
        self.params_bind_group.set(render_pass);
        self.particles_bind_group.set(render_pass);
        // Two triangles per particle, one instance per particle
        render_pass.draw(0..6, 0..store.count());
    }

    pub fn destroy(&self) {
        self.render_params_buffer.destroy();
    }
}

/// Where the vertex shader puts one corner of a particle's quad, in normalized device
/// coordinates. `corner` is in [-1, 1] on both axes. Returns `None` for particles behind the
/// camera, which the shader pushes out of the depth range.
///
/// MUST match `vs` in billboard.wgsl.
pub fn project_billboard(
    position: Vec3,
    corner: glam::Vec2,
    params: &render_shader::RenderParams,
) -> Option<Vec3> {
    let clip = params.world_to_clip * position.extend(1.0);
    if clip.w <= 0.0 {
        return None;
    }

    let ndc = clip.truncate() / clip.w;
    let radius = params.flake_radius * 2.0 / params.viewport;
    Some((ndc.truncate() + corner * radius).extend(ndc.z))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::camera::MapCamera;

    fn params(
        camera: &MapCamera,
        viewport: glam::Vec2,
        radius: f32,
    ) -> render_shader::RenderParams {
        render_shader::RenderParams {
            world_to_clip: camera.world_to_clip(viewport),
            color: glam::Vec4::ONE,
            viewport,
            flake_radius: radius,
            alt_span: 1.0,
        }
    }

    /// Half the NDC width and height of the projected quad.
    fn half_extent(position: Vec3, params: &render_shader::RenderParams) -> glam::Vec2 {
        let left = project_billboard(position, glam::vec2(-1.0, 0.0), params).unwrap();
        let right = project_billboard(position, glam::vec2(1.0, 0.0), params).unwrap();
        let bottom = project_billboard(position, glam::vec2(0.0, -1.0), params).unwrap();
        let top = project_billboard(position, glam::vec2(0.0, 1.0), params).unwrap();
        glam::vec2((right.x - left.x) / 2.0, (top.y - bottom.y) / 2.0)
    }

    #[test]
    fn size_is_independent_of_position_zoom_and_tilt() {
        let viewport = glam::vec2(1280.0, 720.0);
        let radius = 3.0;
        let expected = glam::vec2(radius * 2.0 / viewport.x, radius * 2.0 / viewport.y);

        for (zoom, pitch, bearing) in [(2.0, 0.0, 0.0), (4.0, 45.0, 30.0), (6.0, 60.0, 200.0)] {
            let camera = MapCamera {
                zoom,
                pitch,
                bearing,
                ..MapCamera::default()
            };
            let params = params(&camera, viewport, radius);
            let step = camera.pixel_to_world();
            for offset in [
                glam::vec3(0.0, 0.0, 0.0),
                glam::vec3(200.0, -150.0, 0.0),
                glam::vec3(-300.0, 100.0, 250.0),
                glam::vec3(50.0, 50.0, 500.0),
            ] {
                let position = camera.center.extend(0.0) + offset * step;
                let extent = half_extent(position, &params);
                assert!(
                    (extent - expected).abs().max_element() < 1e-5,
                    "zoom {zoom} pitch {pitch} offset {offset}: {extent} != {expected}"
                );
            }
        }
    }

    #[test]
    fn center_follows_the_camera_matrix() {
        let viewport = glam::vec2(800.0, 600.0);
        let camera = MapCamera {
            zoom: 3.0,
            pitch: 30.0,
            ..MapCamera::default()
        };
        let params = params(&camera, viewport, 4.0);
        let position =
            camera.center.extend(0.0) + glam::vec3(120.0, 40.0, 10.0) * camera.pixel_to_world();
        let center = project_billboard(position, glam::Vec2::ZERO, &params).unwrap();
        let expected = params.world_to_clip.project_point3(position);
        assert!((center - expected).abs().max_element() < 1e-5);
    }

    #[test]
    fn particles_behind_the_camera_are_dropped() {
        let params = render_shader::RenderParams {
            world_to_clip: glam::Mat4::perspective_rh(1.0, 1.0, 0.1, 10.0),
            color: glam::Vec4::ONE,
            viewport: glam::vec2(100.0, 100.0),
            flake_radius: 2.0,
            alt_span: 1.0,
        };
        // Right-handed: the camera looks down -z.
        let in_front = glam::vec3(0.0, 0.0, -1.0);
        let behind = glam::vec3(0.0, 0.0, 1.0);
        assert!(project_billboard(in_front, glam::Vec2::ZERO, &params).is_some());
        assert!(project_billboard(behind, glam::Vec2::ZERO, &params).is_none());
    }

    #[test]
    fn render_params_match_the_wgsl_layout() {
        assert_eq!(size_of::<render_shader::RenderParams>(), 96);
    }
}
