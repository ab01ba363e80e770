//! Window and event loop.
//!
//! [`run`] opens the window, builds the GPU context and the [`Viewer`], and
//! drives one frame per redraw: poll loads, route input, update, render.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context as _;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::config::ViewerConfig;
use crate::gpu::GpuContext;
use crate::input::Input;
use crate::renderer::Renderer;
use crate::viewer::{Viewer, Viewport};

/// Open the viewer window and run until it is closed.
///
/// # Example
/// ```no_run
/// firefly_viewer::run(firefly_viewer::ViewerConfig::new().asset_root("assets"))?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn run(config: ViewerConfig) -> anyhow::Result<()> {
    let event_loop = EventLoop::new().context("creating the event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = FireflyApp {
        state: AppState::Pending {
            config: Some(config),
        },
        error: None,
    };
    event_loop.run_app(&mut app).context("running the event loop")?;

    match app.error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

struct FireflyApp {
    state: AppState,
    /// Startup failure, reported once the loop exits.
    error: Option<anyhow::Error>,
}

enum AppState {
    Pending {
        config: Option<ViewerConfig>,
    },
    Running {
        window: Arc<Window>,
        gpu: GpuContext,
        renderer: Renderer,
        viewer: Viewer,
        input: Input,
    },
}

fn start(event_loop: &ActiveEventLoop, config: ViewerConfig) -> anyhow::Result<AppState> {
    let attrs = WindowAttributes::default()
        .with_title(&config.title)
        .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height));
    let window = Arc::new(
        event_loop
            .create_window(attrs)
            .context("creating the window")?,
    );

    let gpu = GpuContext::new(window.clone()).context("initializing the GPU")?;
    let size = window.inner_size();
    let viewport = Viewport::from_physical(size.width, size.height, window.scale_factor());

    let mut viewer = Viewer::new(config, viewport).with_audio();
    viewer.start_loading();
    let renderer = Renderer::new(&gpu, &viewer);

    Ok(AppState::Running {
        window,
        gpu,
        renderer,
        viewer,
        input: Input::new(),
    })
}

impl ApplicationHandler for FireflyApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let AppState::Pending { config } = &mut self.state else {
            return;
        };
        let Some(config) = config.take() else {
            return;
        };
        match start(event_loop, config) {
            Ok(state) => self.state = state,
            Err(e) => {
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let AppState::Running {
            window,
            gpu,
            renderer,
            viewer,
            input,
        } = &mut self.state
        else {
            return;
        };

        input.handle_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                gpu.resize(size.width, size.height);
                viewer.resize(Viewport::from_physical(
                    size.width,
                    size.height,
                    window.scale_factor(),
                ));
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                let size = window.inner_size();
                gpu.resize(size.width, size.height);
                viewer.resize(Viewport::from_physical(size.width, size.height, scale_factor));
            }
            WindowEvent::RedrawRequested => {
                viewer.poll_assets();
                viewer.process_input(input);
                viewer.update(Instant::now());

                match renderer.render(gpu, viewer) {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        gpu.reconfigure();
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("out of GPU memory, exiting");
                        event_loop.exit();
                    }
                    Err(e) => log::warn!("dropped frame: {e}"),
                }

                input.end_frame();
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let AppState::Running { window, .. } = &self.state {
            window.request_redraw();
        }
    }
}
