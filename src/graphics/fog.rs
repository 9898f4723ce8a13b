//! Radial fog vignette on top of the snow.

use crate::shaders::fog_shader as render_shader;

pub struct Pipeline {
    fog_params_buffer: wgpu::Buffer,
    bind_group: render_shader::bind_groups::BindGroup0,
    render_pipeline: wgpu::RenderPipeline,
}

impl Pipeline {
    pub fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat) -> Self {
        let fog_params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("fog_params_buffer"),
            size: size_of::<render_shader::FogParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = render_shader::bind_groups::BindGroup0::from_bindings(
            device,
            render_shader::bind_groups::BindGroupLayout0 {
                params: fog_params_buffer.as_entire_buffer_binding(),
            },
        );

        let render_shader_module = render_shader::create_shader_module(device);
        let render_pipeline_layout = render_shader::create_pipeline_layout(device);
        let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("fog render pipeline"),
            layout: Some(&render_pipeline_layout),
            vertex: render_shader::vertex_state(&render_shader_module, &render_shader::vs_entry()),
            fragment: Some(render_shader::fragment_state(
                &render_shader_module,
                &render_shader::fs_entry([Some(wgpu::ColorTargetState {
                    format: surface_format,
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
            fog_params_buffer,
            bind_group,
            render_pipeline,
        }
    }

    pub fn set_params(&self, queue: &wgpu::Queue, params: &render_shader::FogParams) {
        queue.write_buffer(&self.fog_params_buffer, 0, bytemuck::bytes_of(params));
    }

    pub fn render_pass(&self, render_pass: &mut wgpu::RenderPass) {
        render_pass.set_pipeline(&self.render_pipeline);
        self.bind_group.set(render_pass);
        render_pass.draw(0..3, 0..1);
    }

    pub fn destroy(&self) {
        self.fog_params_buffer.destroy();
    }
}
