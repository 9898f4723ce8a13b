//! A stand-in map host: a pannable, zoomable, rotatable, tiltable camera over an empty map,
//! with the snow layer drawn on top.

use std::sync::Arc;
use std::time::Instant;

use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key, KeyCode, NamedKey, PhysicalKey},
    window::{Fullscreen, Window, WindowId},
};

use snowfall::fs::OptionPresets;
use snowfall::{GpuContext, MapCamera, ProjectionKind, Readiness, SnowLayer};

/// Background the "map" is cleared to before the snow is drawn.
const MAP_COLOR: wgpu::Color = wgpu::Color {
    r: 0.05,
    g: 0.08,
    b: 0.12,
    a: 1.0,
};

const PAN_PIXELS: f32 = 40.0;
const ZOOM_STEP: f32 = 0.25;
const ROTATE_DEGREES: f32 = 5.0;
const PITCH_DEGREES: f32 = 5.0;
const OPTION_STEP: f32 = 0.05;

struct State {
    window: Arc<Window>,

    gpu: GpuContext,
    size: winit::dpi::PhysicalSize<u32>,
    surface: wgpu::Surface<'static>,
    surface_format: wgpu::TextureFormat,

    camera: MapCamera,
    projection: ProjectionKind,
    presets: OptionPresets,
    layer: SnowLayer,
    started: Instant,
}

impl State {
    async fn new(flags: &flags::Main, window: Arc<Window>) -> Result<State, String> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance
            .create_surface(window.clone())
            .map_err(|err| format!("could not create surface: {err}"))?;

        let gpu = GpuContext::request(&instance, Some(&surface))
            .await
            .map_err(|err| format!("could not acquire a GPU: {err}"))?;

        let size = window.inner_size();
        let cap = surface.get_capabilities(&gpu.adapter);
        let surface_format = *cap
            .formats
            .first()
            .ok_or("surface is incompatible with the adapter")?;

        let presets = match &flags.options {
            Some(path) => OptionPresets::read_or_default(path.clone()),
            None => OptionPresets::default(),
        };

        let mut layer = SnowLayer::new(presets.options().clone());
        match layer
            .initialize(Ok(gpu.clone()), surface_format.add_srgb_suffix())
            .await
            .map_err(|err| err.to_string())?
        {
            Readiness::Running => {}
            Readiness::Inert => log::warn!("No snow on this GPU, showing the map only"),
        }

        let mut state = State {
            window,
            gpu,
            size,
            surface,
            surface_format,
            camera: MapCamera::default(),
            projection: if flags.screen_space {
                ProjectionKind::ScreenSpace
            } else {
                ProjectionKind::Georeferenced
            },
            presets,
            layer,
            started: Instant::now(),
        };

        // Configure surface for the first time
        state.configure_surface();

        Ok(state)
    }

    fn get_window(&self) -> &Window {
        &self.window
    }

    fn configure_surface(&mut self) {
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: self.surface_format,
            // Request compatibility with the sRGB-format texture view we‘re going to create
            // later.
            view_formats: vec![self.surface_format.add_srgb_suffix()],
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            width: self.size.width,
            height: self.size.height,
            desired_maximum_frame_latency: 1,
            present_mode: wgpu::PresentMode::AutoVsync,
        };
        self.surface.configure(&self.gpu.device, &surface_config);
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;

        // reconfigure the surface
        self.configure_surface();
    }

    fn render(&mut self) {
        let logical = self.size.to_logical::<f32>(self.window.scale_factor());
        let viewport = glam::vec2(logical.width, logical.height);
        let elapsed = self.started.elapsed().as_secs_f64();
        let frame = self.camera.frame(viewport, elapsed, self.projection);
        let snowing = self.layer.prerender(&frame);

        // Create texture view
        let Ok(surface_texture) = self.surface.get_current_texture() else {
            // Surface texture creation failed for whatever reason; on Linux, this usually means
            // that the window was drawn over by something else.
            self.window.request_redraw();
            return;
        };

        let surface_texture_view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor {
                label: Some("surface_texture_view"),
                format: Some(self.surface_format.add_srgb_suffix()),
                dimension: Some(wgpu::TextureViewDimension::D2),
                usage: Some(wgpu::TextureUsages::RENDER_ATTACHMENT),
                aspect: wgpu::TextureAspect::All,
                base_mip_level: 0,
                mip_level_count: None,
                base_array_layer: 0,
                array_layer_count: None,
            });

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("encoder"),
            });

        {
            // Stands in for the map renderer
            let _map_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("map_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &surface_texture_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(MAP_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }

        if snowing {
            // The layer requests the next redraw itself
            self.layer
                .render(&mut encoder, &surface_texture_view, self.window.as_ref());
        }

        self.gpu.queue.submit([encoder.finish()]);
        self.window.pre_present_notify();
        surface_texture.present();
    }

    /// Returns whether the key was handled.
    fn handle_keypress(&mut self, key: KeyCode) -> bool {
        match key {
            KeyCode::ArrowLeft => self.camera.pan(glam::vec2(-PAN_PIXELS, 0.0)),
            KeyCode::ArrowRight => self.camera.pan(glam::vec2(PAN_PIXELS, 0.0)),
            KeyCode::ArrowUp => self.camera.pan(glam::vec2(0.0, -PAN_PIXELS)),
            KeyCode::ArrowDown => self.camera.pan(glam::vec2(0.0, PAN_PIXELS)),
            KeyCode::Equal => self.camera.zoom_by(ZOOM_STEP),
            KeyCode::Minus => self.camera.zoom_by(-ZOOM_STEP),
            KeyCode::KeyQ => self.camera.rotate_by(-ROTATE_DEGREES),
            KeyCode::KeyE => self.camera.rotate_by(ROTATE_DEGREES),
            KeyCode::KeyW => self.camera.pitch_by(PITCH_DEGREES),
            KeyCode::KeyS => self.camera.pitch_by(-PITCH_DEGREES),
            KeyCode::BracketLeft => {
                let options = self.presets.previous().clone();
                self.layer.set_options(options);
            }
            KeyCode::BracketRight => {
                let options = self.presets.next().clone();
                self.layer.set_options(options);
            }
            KeyCode::Enter => self.presets.save(),
            KeyCode::KeyD => self.edit_options(|o| o.density = (o.density + OPTION_STEP).min(1.0)),
            KeyCode::KeyC => self.edit_options(|o| o.density = (o.density - OPTION_STEP).max(0.0)),
            KeyCode::KeyI => {
                self.edit_options(|o| o.intensity = (o.intensity + OPTION_STEP).min(1.0))
            }
            KeyCode::KeyK => {
                self.edit_options(|o| o.intensity = (o.intensity - OPTION_STEP).max(0.0))
            }
            KeyCode::KeyF => self.edit_options(|o| o.fog = !o.fog),
            _ => return false,
        }
        true
    }

    fn edit_options(&mut self, f: impl FnOnce(&mut snowfall::SnowOptions)) {
        let options = self.presets.edit(f).clone();
        self.layer.set_options(options);
    }
}

struct App {
    flags: flags::Main,
    close_requested: bool,
    state: Option<State>,
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        // Create window object
        let window_attributes = Window::default_attributes().with_title("snowfall");
        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("Could not create window: {err}");
                event_loop.exit();
                return;
            }
        };

        match pollster::block_on(State::new(&self.flags, window.clone())) {
            Ok(state) => self.state = Some(state),
            Err(err) => {
                log::error!("{err}");
                event_loop.exit();
                return;
            }
        }

        window.request_redraw();
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        match event {
            WindowEvent::CloseRequested => {
                log::info!("The close button was pressed; stopping");
                state.layer.remove();
                self.close_requested = true;
            }
            WindowEvent::RedrawRequested => {
                state.render();
            }
            WindowEvent::Resized(size) => {
                // Reconfigures the size of the surface. We do not re-render
                // here as this event is always followed up by redraw request.
                state.resize(size);
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::F11),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                // Toggle fullscreen
                let window = state.get_window();
                if window.fullscreen().is_some() {
                    window.set_fullscreen(None);
                } else {
                    window.set_fullscreen(Some(Fullscreen::Borderless(window.current_monitor())));
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                if state.handle_keypress(key) && !state.layer.is_running() {
                    // Nothing else is animating, so redraw the map by hand
                    state.get_window().request_redraw();
                }
            }
            _ => (),
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.close_requested {
            event_loop.exit();
        }
    }
}

mod flags {
    use std::path::PathBuf;

    xflags::xflags! {
        cmd main {
            /// JSON file of option presets. Created on first save if missing.
            optional --options file: PathBuf
            /// Draw particles in screen space instead of anchoring them to the map.
            optional --screen-space
        }
    }
}

fn main() {
    // wgpu uses `log` for all of our logging, so we initialize a logger with the `env_logger`
    // crate.
    //
    // To change the log level, set the `RUST_LOG` environment variable. See the `env_logger`
    // documentation for more information.
    env_logger::init();

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(err) => {
            log::error!("Could not create event loop: {err}");
            std::process::exit(1);
        }
    };

    // The snow layer drives redraws by itself, so there is no need to spin.
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App {
        flags: flags::Main::from_env_or_exit(),
        state: None,
        close_requested: false,
    };
    if let Err(err) = event_loop.run_app(&mut app) {
        log::error!("Event loop failed: {err}");
        std::process::exit(1);
    }
}
