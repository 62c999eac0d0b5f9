//! AR Smart Camera - Main Entry Point
//!
//! Classifies the live webcam feed and, on each tap, anchors the current
//! label in 3D at the feature point under the centre of the view.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ar_smart_camera::config::AppConfig;
use ar_smart_camera::logging::{init_logging, LogConfig};
use ar_smart_camera::App;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, MouseButton, TouchPhase, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

const TARGET_FPS: u32 = 60;

/// Application state machine
enum AppState {
    /// Initial state before window is created
    Uninitialized,
    /// Window and graphics context are ready
    Running { window: Arc<Window>, app: App },
}

/// Main application handler implementing winit's ApplicationHandler trait
struct SmartCameraApp {
    settings: AppConfig,
    state: AppState,
    next_redraw_at: Instant,
}

impl SmartCameraApp {
    fn new(settings: AppConfig) -> Self {
        Self {
            settings,
            state: AppState::Uninitialized,
            next_redraw_at: Instant::now(),
        }
    }
}

impl ApplicationHandler for SmartCameraApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let AppState::Running { app, .. } = &mut self.state {
            app.set_visible(true);
            return;
        }

        log::info!("Creating window...");

        let display = &self.settings.display;
        let window_attributes = WindowAttributes::default()
            .with_title(display.window_title.as_str())
            .with_inner_size(LogicalSize::new(display.window_width, display.window_height));

        let window = Arc::new(
            event_loop
                .create_window(window_attributes)
                .expect("Failed to create window"),
        );

        log::info!(
            "Window created: {}x{}",
            window.inner_size().width,
            window.inner_size().height
        );

        log::info!("Initializing wgpu and egui...");
        let mut app = match pollster::block_on(App::new(window.clone(), self.settings.clone())) {
            Ok(app) => app,
            Err(e) => {
                log::error!("Failed to initialize graphics: {}", e);
                event_loop.exit();
                return;
            }
        };
        app.set_visible(true);

        log::info!("AR Smart Camera ready!");
        log::info!("Click, touch or press Space to place a label; ESC to exit, F11 for fullscreen");

        self.state = AppState::Running { window, app };
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        if let AppState::Running { app, .. } = &mut self.state {
            app.set_visible(false);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let AppState::Running { window, app } = &mut self.state else {
            return;
        };

        // Let egui handle the event first
        let egui_consumed = app.handle_window_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, exiting...");
                event_loop.exit();
            }

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key_code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } if !egui_consumed => match key_code {
                KeyCode::Escape => {
                    log::info!("Escape pressed, exiting...");
                    event_loop.exit();
                }
                KeyCode::F11 => {
                    if window.fullscreen().is_some() {
                        window.set_fullscreen(None);
                        log::info!("Exiting fullscreen");
                    } else {
                        window.set_fullscreen(Some(winit::window::Fullscreen::Borderless(None)));
                        log::info!("Entering fullscreen");
                    }
                }
                KeyCode::Space => {
                    app.tap_at_cursor();
                }
                _ => {}
            },

            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } if !egui_consumed => {
                app.tap_at_cursor();
            }

            WindowEvent::Touch(touch) if touch.phase == TouchPhase::Started && !egui_consumed => {
                app.on_tap(touch.location.x as f32, touch.location.y as f32);
            }

            WindowEvent::CursorMoved { position, .. } => {
                app.on_mouse_move(position.x as f32, position.y as f32);
            }

            WindowEvent::Occluded(occluded) => {
                app.set_visible(!occluded);
            }

            WindowEvent::Resized(physical_size) => {
                app.resize(physical_size);
            }

            WindowEvent::RedrawRequested => {
                app.update();

                match app.render() {
                    Ok(_) => {}
                    Err(wgpu::SurfaceError::Lost) => {
                        log::warn!("Surface lost, reconfiguring...");
                        app.resize(app.size());
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("Out of GPU memory!");
                        event_loop.exit();
                    }
                    Err(e) => {
                        log::warn!("Surface error: {:?}", e);
                    }
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let AppState::Running { window, app } = &mut self.state else {
            event_loop.set_control_flow(ControlFlow::Wait);
            return;
        };

        if !app.is_visible() {
            event_loop.set_control_flow(ControlFlow::Wait);
            return;
        }

        // Drive redraws at target FPS
        let frame_duration = Duration::from_nanos(1_000_000_000u64 / TARGET_FPS as u64);
        let now = Instant::now();

        if now >= self.next_redraw_at {
            window.request_redraw();
            self.next_redraw_at += frame_duration;

            // Reset if too far behind
            if now > self.next_redraw_at + frame_duration * 2 {
                self.next_redraw_at = now + frame_duration;
            }
        }

        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_redraw_at));
    }
}

fn main() {
    let loaded = AppConfig::load();

    let log_config = LogConfig::with_level(loaded.config.log.level.clone());
    if let Err(e) = init_logging(&log_config) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    log::info!("AR Smart Camera v{}", env!("CARGO_PKG_VERSION"));
    loaded.log_outcome();
    let settings = loaded.config;
    log::debug!("Configuration: {:?}", settings);

    let event_loop = EventLoop::new().expect("Failed to create event loop");
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = SmartCameraApp::new(settings);
    event_loop.run_app(&mut app).expect("Event loop error");
}
