//! Application state holding the wgpu graphics context
//!
//! Owns the window surface, the AR session, the classifier loop and the
//! [`AppContext`]. The event loop in `main.rs` forwards visibility changes,
//! taps and redraws here.

use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::{Vec2, Vec3};
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::window::Window;

use crate::ar::{FrameSource, Viewport, VirtualCamera, WorldTrackingConfiguration};
use crate::camera::DesktopArSession;
use crate::config::AppConfig;
use crate::context::AppContext;
use crate::input::handle_tap;
use crate::ml::{Classifier, ClassifierLoop, ClassifierWorker, OnnxClassifier};
use crate::render::{paint_annotations, CameraBackground};
use crate::scene::AnnotationBuilder;

/// Main application state
pub struct App {
    /// Reference to the window
    window: Arc<Window>,
    /// The wgpu surface for presenting rendered frames
    surface: wgpu::Surface<'static>,
    /// The wgpu device for creating GPU resources
    device: wgpu::Device,
    /// The command queue for submitting GPU work
    queue: wgpu::Queue,
    /// Surface configuration
    config: wgpu::SurfaceConfiguration,
    /// Current window size in physical pixels
    size: PhysicalSize<u32>,

    settings: AppConfig,

    // AR session and shared state
    session: Arc<DesktopArSession>,
    camera_model: VirtualCamera,
    context: AppContext,
    classifier_loop: Option<ClassifierLoop>,
    visible: bool,

    // Camera background
    background: CameraBackground,

    // egui integration
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,

    // Frame timing
    frame_count: u64,
    fps: f64,
    last_fps_update: Instant,
    frames_since_update: u64,

    // Mouse position in physical pixels
    cursor_position: (f32, f32),
}

impl App {
    /// Create a new App with an initialized wgpu context.
    ///
    /// The AR session is created paused; call [`App::set_visible`] to start it.
    pub async fn new(window: Arc<Window>, settings: AppConfig) -> Result<Self, String> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| format!("Failed to create surface: {}", e))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| "Failed to find suitable GPU adapter".to_string())?;

        log::info!("Using GPU: {}", adapter.get_info().name);
        log::info!("Backend: {:?}", adapter.get_info().backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("AR Smart Camera Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| format!("Failed to create device: {}", e))?;

        let surface_caps = surface.get_capabilities(&adapter);

        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| "Surface reports no formats".to_string())?;

        log::info!("Surface format: {:?}", surface_format);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        surface.configure(&device, &config);

        let background = CameraBackground::new(&device, surface_format);

        // Initialize egui
        let egui_ctx = egui::Context::default();
        let mut style = (*egui_ctx.style()).clone();
        style.visuals.window_shadow = egui::epaint::Shadow::NONE;
        egui_ctx.set_style(style);

        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        let egui_renderer = egui_wgpu::Renderer::new(&device, surface_format, None, 1, false);

        // AR session, context and classifier loop
        let session = Arc::new(DesktopArSession::new(settings.camera.clone()));
        let camera_model = session.camera_model();
        let frame_source: Arc<dyn FrameSource> = session.clone();

        let logical = size.to_logical::<f32>(window.scale_factor());
        let context = AppContext::new(
            frame_source.clone(),
            Viewport::new(logical.width, logical.height),
            AnnotationBuilder::new(settings.annotation.clone()),
        );

        let classifier_loop = Self::start_classifier(&settings, frame_source, &context);

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            settings,
            session,
            camera_model,
            context,
            classifier_loop,
            visible: false,
            background,
            egui_ctx,
            egui_state,
            egui_renderer,
            frame_count: 0,
            fps: 0.0,
            last_fps_update: Instant::now(),
            frames_since_update: 0,
            cursor_position: (0.0, 0.0),
        })
    }

    /// Load the model and spawn the loop; a missing model leaves the loop inert
    fn start_classifier(
        settings: &AppConfig,
        frame_source: Arc<dyn FrameSource>,
        context: &AppContext,
    ) -> Option<ClassifierLoop> {
        let classifier: Option<Box<dyn Classifier>> = match OnnxClassifier::load(&settings.classifier) {
            Ok(classifier) => {
                log::info!("Classifier ready with {} labels", classifier.label_count());
                Some(Box::new(classifier))
            }
            Err(e) => {
                log::warn!("Classifier unavailable: {}", e);
                None
            }
        };

        let worker = ClassifierWorker::new(
            frame_source,
            classifier,
            context.prediction.clone(),
            context.diagnostics.clone(),
        );

        let idle_delay = Duration::from_millis(settings.classifier.idle_delay_ms);
        match ClassifierLoop::spawn(worker, idle_delay) {
            Ok(classifier_loop) => Some(classifier_loop),
            Err(e) => {
                log::error!("{}", e);
                None
            }
        }
    }

    /// Handle a window event, returning true if egui consumed it
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        let response = self.egui_state.on_window_event(&self.window, event);
        response.consumed
    }

    /// Resize the surface
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);

            let logical = new_size.to_logical::<f32>(self.window.scale_factor());
            self.context.set_viewport(logical.width, logical.height);
        }
    }

    /// Get current size
    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    /// Run world tracking while the view is visible, pause it otherwise
    pub fn set_visible(&mut self, visible: bool) {
        if visible == self.visible {
            return;
        }
        self.visible = visible;

        if visible {
            log::info!("View visible, running AR session");
            self.background.reset_sequence();
            self.session.run(WorldTrackingConfiguration::default());
        } else {
            log::info!("View hidden, pausing AR session");
            self.session.pause();
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Handle mouse movement
    pub fn on_mouse_move(&mut self, x: f32, y: f32) {
        self.cursor_position = (x, y);
    }

    /// Tap at a position in physical pixels
    pub fn on_tap(&mut self, x: f32, y: f32) -> Option<Vec3> {
        let scale = self.window.scale_factor() as f32;
        handle_tap(&mut self.context, Vec2::new(x, y) / scale)
    }

    /// Tap at the last known cursor position
    pub fn tap_at_cursor(&mut self) -> Option<Vec3> {
        let (x, y) = self.cursor_position;
        self.on_tap(x, y)
    }

    /// Per-frame update before rendering
    pub fn update(&mut self) {
        if !self.visible {
            return;
        }
        if let Some(frame) = self.session.current_frame() {
            self.background.upload(&self.device, &self.queue, &frame);
        }
    }

    /// Number of annotations placed so far
    pub fn annotation_count(&self) -> usize {
        self.context.scene.node_count()
    }

    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        self.background.render(
            &self.queue,
            &mut encoder,
            &view,
            (self.config.width, self.config.height),
        );

        self.render_ui(&mut encoder, &view);

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        self.update_fps();

        Ok(())
    }

    fn render_ui(&mut self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        let raw_input = self.egui_state.take_egui_input(&self.window);

        let (object_text, confidence_text) = self.context.diagnostics.snapshot();
        let show_statistics = self.settings.display.show_statistics;
        let statistics = format!(
            "FPS: {:.1} | Camera frames: {} | Nodes: {}",
            self.fps,
            self.session.frame_count(),
            self.context.scene.node_count()
        );
        let scene = &self.context.scene;
        let camera_model = &self.camera_model;
        let viewport = self.context.viewport;

        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            let painter = ctx.layer_painter(egui::LayerId::background());
            paint_annotations(&painter, scene, camera_model, viewport);

            egui::Area::new(egui::Id::new("diagnostics"))
                .anchor(egui::Align2::LEFT_TOP, [12.0, 12.0])
                .show(ctx, |ui| {
                    egui::Frame::popup(ui.style()).show(ui, |ui| {
                        ui.label(&object_text);
                        ui.label(&confidence_text);
                    });
                });

            if show_statistics {
                egui::Area::new(egui::Id::new("statistics"))
                    .anchor(egui::Align2::LEFT_BOTTOM, [12.0, -12.0])
                    .show(ctx, |ui| {
                        ui.label(
                            egui::RichText::new(&statistics)
                                .monospace()
                                .color(egui::Color32::WHITE),
                        );
                    });
            }
        });

        self.egui_state.handle_platform_output(&self.window, full_output.platform_output);

        let paint_jobs = self.egui_ctx.tessellate(full_output.shapes, full_output.pixels_per_point);

        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer.update_texture(&self.device, &self.queue, *id, image_delta);
        }

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: self.window.scale_factor() as f32,
        };

        self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            encoder,
            &paint_jobs,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                })
                .forget_lifetime();

            self.egui_renderer.render(&mut render_pass, &paint_jobs, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
    }

    fn update_fps(&mut self) {
        self.frame_count += 1;
        self.frames_since_update += 1;

        let now = Instant::now();
        let elapsed = now.duration_since(self.last_fps_update).as_secs_f64();
        if elapsed >= 1.0 {
            self.fps = self.frames_since_update as f64 / elapsed;
            self.frames_since_update = 0;
            self.last_fps_update = now;
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        // Stop classifying before the camera goes away
        if let Some(mut classifier_loop) = self.classifier_loop.take() {
            classifier_loop.stop();
        }
        self.session.pause();
        log::info!(
            "Shut down after {} frames with {} annotations",
            self.frame_count,
            self.annotation_count()
        );
    }
}
