//! SonicSphere - an audio player whose playback drives a real-time,
//! mode-switchable 3D visualization.
//!
//! The frame loop is the heartbeat: every redraw polls playback, drains
//! finished theme classifications, snapshots the spectrum, and rebuilds
//! the scene for whichever visualization mode is active.

mod art;
mod camera;
mod cli;
mod params;
mod player;
mod rendering;
mod spectrum;
mod theme;
mod transport;
mod viz;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use log::{error, info, warn};
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use camera::CameraSystem;
use cli::Args;
use params::*;
use player::{PlaybackController, TrackId};
use rendering::{RenderSystem, Uniforms};
use spectrum::{FrequencyAnalysis, SpectrumSource};
use theme::{PaletteClassifier, ThemeResolver};
use transport::RodioTransport;
use viz::{FrameInput, VisualizationMode, VisualizationRenderer};

/// Main application state
struct App {
    // Window and rendering
    window: Option<Arc<Window>>,
    render_system: Option<RenderSystem>,

    // Playback and analysis
    controller: PlaybackController,
    resolver: ThemeResolver,
    spectrum: SpectrumSource,
    analysis: FrequencyAnalysis,

    // Visualization
    viz: VisualizationRenderer,
    camera: CameraSystem,

    // Configuration
    render_config: RenderConfig,

    // Time tracking
    start_time: Instant,
    last_frame: Instant,

    /// Track whose cover art currently backs the label texture
    label_track: Option<TrackId>,

    /// CLI arguments consumed once the window is up
    startup: Option<Args>,
}

impl App {
    fn new(args: Args) -> Result<Self> {
        let controller =
            PlaybackController::new(Box::new(RodioTransport::new()), args.volume);

        let mut spectrum = SpectrumSource::new(SpectrumConfig::default())?;
        spectrum.attach(controller.sample_tap());

        let resolver = ThemeResolver::new(Arc::new(PaletteClassifier), args.parse_theme());
        let viz = VisualizationRenderer::new(args.parse_mode(), VisualTuning::default());
        let camera = CameraSystem::new(CameraOrbit::default());

        let now = Instant::now();
        Ok(Self {
            window: None,
            render_system: None,
            controller,
            resolver,
            spectrum,
            analysis: FrequencyAnalysis::default(),
            viz,
            camera,
            render_config: RenderConfig::default(),
            start_time: now,
            last_frame: now,
            label_track: None,
            startup: Some(args),
        })
    }
}

impl ApplicationHandler for App {
    fn about_to_wait(&mut self, _event_loop: &winit::event_loop::ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn resumed(&mut self, event_loop: &winit::event_loop::ActiveEventLoop) {
        if self.window.is_some() {
            return; // Already initialized
        }

        // Create window
        let window_attributes = Window::default_attributes()
            .with_title("SonicSphere")
            .with_inner_size(winit::dpi::LogicalSize::new(
                self.render_config.window_width,
                self.render_config.window_height,
            ));

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                error!("failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        // Initialize rendering system
        let render_system = match pollster::block_on(RenderSystem::new(Arc::clone(&window))) {
            Ok(rs) => rs,
            Err(e) => {
                error!("failed to initialize renderer: {e:#}");
                event_loop.exit();
                return;
            }
        };

        self.window = Some(window);
        self.render_system = Some(render_system);

        // Queue whatever the command line asked for
        if let Some(args) = self.startup.take() {
            if !args.files.is_empty() {
                self.controller.load_tracks(&args.files, &mut self.resolver);
            }
            if let Some(url) = args.url {
                self.controller.add_url_track(url, &mut self.resolver);
            }
        }

        println!("\nSonicSphere is running!");
        println!("  Space       play / pause");
        println!("  N / P       next / previous track");
        println!("  X           remove current track");
        println!("  1-6         visualization mode");
        println!("  T           cycle color theme");
        println!("  Up / Down   volume");
        println!("  Left/Right  seek 5s");
        println!("  Esc         quit\n");
    }

    fn window_event(
        &mut self,
        event_loop: &winit::event_loop::ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(rs) = &mut self.render_system {
                    rs.resize(size.width, size.height);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(code),
                        repeat: false,
                        ..
                    },
                ..
            } => self.handle_key(event_loop, code),
            WindowEvent::RedrawRequested => {
                self.render_frame();
            }
            _ => {}
        }
    }
}

impl App {
    fn handle_key(&mut self, event_loop: &winit::event_loop::ActiveEventLoop, code: KeyCode) {
        match code {
            KeyCode::Escape => event_loop.exit(),
            KeyCode::Space => self.controller.toggle_play_pause(),
            KeyCode::KeyN => self.controller.next(&mut self.resolver),
            KeyCode::KeyP => self.controller.previous(&mut self.resolver),
            KeyCode::KeyX => {
                if let Some(id) = self.controller.current_track_id() {
                    self.controller.remove_track(id, &mut self.resolver);
                }
            }
            KeyCode::KeyT => {
                let mode = self.resolver.cycle_mode();
                info!("theme mode: {}", mode.label());
            }
            KeyCode::ArrowUp => {
                let volume = self.controller.volume() + 0.05;
                self.controller.set_volume(volume);
            }
            KeyCode::ArrowDown => {
                let volume = self.controller.volume() - 0.05;
                self.controller.set_volume(volume);
            }
            KeyCode::ArrowRight => {
                let position = self.controller.snapshot().position + Duration::from_secs(5);
                self.controller.seek(position);
            }
            KeyCode::ArrowLeft => {
                let position = self
                    .controller
                    .snapshot()
                    .position
                    .saturating_sub(Duration::from_secs(5));
                self.controller.seek(position);
            }
            KeyCode::Digit1 => self.set_mode(1),
            KeyCode::Digit2 => self.set_mode(2),
            KeyCode::Digit3 => self.set_mode(3),
            KeyCode::Digit4 => self.set_mode(4),
            KeyCode::Digit5 => self.set_mode(5),
            KeyCode::Digit6 => self.set_mode(6),
            _ => {}
        }
    }

    fn set_mode(&mut self, digit: u8) {
        if let Some(mode) = VisualizationMode::from_digit(digit) {
            self.viz.set_mode(mode);
            info!("visualization mode: {}", mode.label());
        }
    }

    /// Render a single frame
    fn render_frame(&mut self) {
        let time_s = self.start_time.elapsed().as_secs_f32();
        let now = Instant::now();
        // Clamp dt so a stall (window drag, debugger) cannot produce one
        // giant simulation step.
        let dt = (now - self.last_frame).as_secs_f32().min(0.1);
        self.last_frame = now;

        // Playback first: track-end advance and finished classifications
        // must land before this frame's theme is resolved.
        self.controller.poll(&mut self.resolver);
        self.resolver.drain(self.controller.tracks_mut());

        let target = self.resolver.target(self.controller.current_track());
        self.resolver.advance(&target, dt);

        // Refresh the vinyl label texture when the current track changes
        let current_id = self.controller.current_track_id();
        if current_id != self.label_track {
            self.label_track = current_id;
            if let Some(rs) = &mut self.render_system {
                let art = self
                    .controller
                    .current_track()
                    .and_then(|t| t.cover_art.as_ref())
                    .map(|a| a.bytes.as_slice());
                rs.set_label_image(art);
            }
        }

        // Spectrum snapshot drives both the bands and the raw per-bin
        // mappings inside each mode.
        let snapshot = self.spectrum.snapshot();
        let bands = self.analysis.sample(snapshot);

        let input = FrameInput {
            spectrum: snapshot,
            bands,
            theme: self.resolver.current(),
            time: time_s,
            dt,
        };
        self.viz.update(&input);

        let Some(rs) = &mut self.render_system else {
            return;
        };

        if self.viz.mode() == VisualizationMode::Orb {
            rs.update_sphere_vertices(self.viz.orb_vertices());
        }

        let (view_proj, _camera_pos) = self
            .camera
            .create_view_proj_matrix(time_s, &self.render_config);

        rs.update_uniforms(&Uniforms {
            view_proj: view_proj.to_cols_array_2d(),
            time: time_s,
            _padding: [0.0; 3],
        });

        match rs.render(self.viz.scene()) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                if let Some(window) = &self.window {
                    let size = window.inner_size();
                    rs.resize(size.width, size.height);
                }
            }
            Err(e) => warn!("render error: {e:?}"),
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut app = App::new(args)?;
    let event_loop = EventLoop::new()?;
    event_loop.run_app(&mut app)?;
    Ok(())
}
