// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crimson_core::init_tracing;
use crimson_platform::AppWindow;
use crimson_render::ResizeSignal;
use crimson_render_vk::{FrameOutcome, VkConfig, VkContext};
use tracing::{debug, error, info};

use crimson_platform::winit::{
    application::ApplicationHandler,
    event::{StartCause, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::WindowId,
};

const TITLE: &str = "Crimson Engine";
const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;
/// How often a paused (zero-area) window re-polls its drawable size.
const PAUSED_POLL: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Render settings file
    #[arg(long, default_value = "crimson.toml")]
    config: PathBuf,
}

struct App {
    cfg: VkConfig,
    // dropped before `window`; the surface must go before the window does
    context: Option<VkContext>,
    window: Option<AppWindow>,
    resize: ResizeSignal,
    fatal: Option<anyhow::Error>,
    exiting: bool,
    paused: bool,
}

impl App {
    fn new(cfg: VkConfig) -> Self {
        Self {
            cfg,
            context: None,
            window: None,
            resize: ResizeSignal::new(),
            fatal: None,
            exiting: false,
            paused: false,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window =
            AppWindow::create(event_loop, TITLE, WIDTH, HEIGHT).context("create window")?;
        let context = VkContext::new(&window, &self.cfg).context("initialize Vulkan")?;
        self.window = Some(window);
        self.context = Some(context);
        Ok(())
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.exiting = true;
        self.context = None;
        self.window = None;
        event_loop.exit();
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        self.fatal = Some(err);
        self.shutdown(event_loop);
    }

    fn draw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(context), Some(window)) = (self.context.as_mut(), self.window.as_ref()) else {
            return;
        };
        match context.render_frame(window, &self.resize) {
            Ok(FrameOutcome::Deferred) => {
                if !self.paused {
                    info!("window has no drawable area, pausing");
                }
                self.paused = true;
            }
            Ok(outcome) => {
                if self.paused {
                    info!("drawable area restored, resuming");
                }
                self.paused = false;
                if outcome != FrameOutcome::Presented {
                    debug!("frame outcome {outcome:?}");
                }
            }
            Err(e) => {
                let err = anyhow::Error::new(e).context("frame failed");
                self.fail(event_loop, err);
            }
        }
    }
}

impl ApplicationHandler for App {
    fn new_events(&mut self, _event_loop: &ActiveEventLoop, cause: StartCause) {
        if self.paused && matches!(cause, StartCause::ResumeTimeReached { .. }) {
            if let Some(w) = &self.window {
                w.request_redraw();
            }
        }
    }

    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(window) = &self.window {
            if window_id != window.id() {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.shutdown(event_loop);
            }
            WindowEvent::Resized(size) => {
                debug!("Resized → {}x{}", size.width, size.height);
                self.resize.raise();
                if let Some(w) = &self.window {
                    w.request_redraw();
                }
            }
            WindowEvent::RedrawRequested => {
                if !self.exiting {
                    self.draw(event_loop);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exiting {
            return;
        }
        if self.paused {
            // minimized: wake up now and then to see if the window came back
            event_loop.set_control_flow(ControlFlow::WaitUntil(Instant::now() + PAUSED_POLL));
            return;
        }
        event_loop.set_control_flow(ControlFlow::Poll);
        if let Some(w) = &self.window {
            w.request_redraw();
        }
    }
}

fn run(args: Args) -> Result<()> {
    let cfg = config::load_cfg(&args.config).render.to_vk();
    let event_loop: EventLoop<()> = EventLoop::new().context("create event loop")?;

    let mut app = App::new(cfg);
    event_loop.run_app(&mut app).context("event loop")?;

    match app.fatal.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
