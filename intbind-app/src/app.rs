use anyhow::Result;
use intbind_audio::{CpalSink, NullSink, ToneBuffer, ToneSink};
use intbind_core::{Key, TrialPhase};
use intbind_engine::{TrialConfig, TrialSequencer};
use intbind_render::{find_system_font, ClockRenderer};
use intbind_timing::{HighPrecisionTimer, Timer};
use pixels::{Pixels, SurfaceTexture};
use rand::rngs::ThreadRng;
use std::sync::Arc;
use std::time::Duration;
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

// Post-trial gap between emitting the record and closing, as in the
// reference block timeline.
const POST_TRIAL_GAP: Duration = Duration::from_millis(1000);

const TONE_FREQ_HZ: f32 = 1000.0;
const TONE_DURATION: Duration = Duration::from_millis(100);
const TONE_SAMPLE_RATE: u32 = 48_000;

/// Host loop for one trial: owns the window, the pixel surface, and the
/// sequencer, and translates winit events into engine calls. Block
/// sequencing across trials lives outside this binary.
pub struct App {
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    renderer: ClockRenderer,
    sequencer: TrialSequencer<HighPrecisionTimer, Box<dyn ToneSink>, ThreadRng>,
    timer: HighPrecisionTimer,
    emitted: bool,
    should_exit: bool,
}

impl App {
    pub fn new(config: TrialConfig) -> Result<Self> {
        let font = find_system_font();
        if font.is_none() {
            eprintln!("No face font found; numerals will be skipped");
        }
        let renderer = ClockRenderer::new(config.clock_diam, font.as_ref())?;

        // Sink and asset setup happens before the trial starts; a missing
        // audio device or broken tone file aborts here, never mid-trial.
        let sink: Box<dyn ToneSink> = if config.play_tone {
            let tone = match &config.tone_file {
                Some(path) => ToneBuffer::from_wav(path)?,
                None => ToneBuffer::sine(TONE_FREQ_HZ, TONE_DURATION, TONE_SAMPLE_RATE),
            };
            Box::new(CpalSink::new(&tone)?)
        } else {
            Box::new(NullSink::new())
        };

        let timer = HighPrecisionTimer::new();
        let sequencer = TrialSequencer::new(config, timer.clone(), sink, rand::rng())?;

        Ok(Self {
            window: None,
            pixels: None,
            renderer,
            sequencer,
            timer,
            emitted: false,
            should_exit: false,
        })
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        println!("=== INTENTIONAL BINDING TRIAL ===");
        println!("Platform: {}", std::env::consts::OS);
        println!("Press ESC to abort.\n");

        event_loop.run_app(&mut self).map_err(Into::into)
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let size = LogicalSize::new(self.renderer.width(), self.renderer.height());
        let window_attributes = Window::default_attributes()
            .with_title("Intentional binding")
            .with_inner_size(size)
            .with_resizable(false);

        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let physical_size = window.inner_size();

        let surface_texture =
            SurfaceTexture::new(physical_size.width, physical_size.height, window.clone());
        let mut pixels = Pixels::new(self.renderer.width(), self.renderer.height(), surface_texture)?;
        pixels.resize_surface(physical_size.width, physical_size.height)?;

        window.set_cursor_visible(false);
        window.request_redraw();

        self.pixels = Some(pixels);
        self.window = Some(window);

        // The trial starts once the surface exists.
        self.sequencer.begin();
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        let Some(pixels) = self.pixels.as_mut() else {
            return Ok(());
        };
        if self.sequencer.is_finished() {
            self.renderer.clear();
        } else {
            self.renderer.render(self.sequencer.clock());
        }
        self.renderer.copy_to(pixels.frame_mut());
        pixels.render()?;
        Ok(())
    }

    fn frame(&mut self, event_loop: &ActiveEventLoop) {
        self.sequencer.update();
        if let Err(e) = self.render() {
            eprintln!("render failed: {e}");
            event_loop.exit();
            return;
        }
        if self.sequencer.is_finished() {
            self.finish(event_loop);
        } else if let Some(win) = &self.window {
            win.request_redraw();
        }
    }

    /// Emits the record to stdout and shuts down after the post-trial gap.
    fn finish(&mut self, event_loop: &ActiveEventLoop) {
        if !self.emitted {
            self.emitted = true;
            if let Some(record) = self.sequencer.record() {
                match serde_json::to_string_pretty(record) {
                    Ok(json) => println!("{json}"),
                    Err(e) => eprintln!("failed to serialize record: {e}"),
                }
            }
            self.timer.sleep(POST_TRIAL_GAP);
        }
        if let Some(window) = &self.window {
            window.set_cursor_visible(true);
        }
        self.should_exit = true;
        event_loop.exit();
    }

    fn handle_input(&mut self, event: winit::event::KeyEvent, event_loop: &ActiveEventLoop) {
        if let PhysicalKey::Code(KeyCode::Escape) = event.physical_key {
            self.sequencer.abort();
            self.finish(event_loop);
            return;
        }
        // Key repeats only matter during estimation, where held rotate
        // keys are expected to repeat at the platform rate.
        if event.repeat && self.sequencer.phase() != TrialPhase::Estimate {
            return;
        }
        let key = map_key(event.physical_key);
        if self.sequencer.handle_key(key) {
            // Discrete adjustments re-render synchronously.
            if let Err(e) = self.render() {
                eprintln!("render failed: {e}");
            }
        }
    }
}

fn map_key(key: PhysicalKey) -> Key {
    match key {
        PhysicalKey::Code(KeyCode::ArrowLeft) => Key::ArrowLeft,
        PhysicalKey::Code(KeyCode::ArrowRight) => Key::ArrowRight,
        PhysicalKey::Code(KeyCode::Enter) => Key::Enter,
        PhysicalKey::Code(KeyCode::Space) => Key::Space,
        PhysicalKey::Code(KeyCode::Escape) => Key::Escape,
        _ => Key::Other,
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                eprintln!("Failed to create window and surface: {e}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                // Abrupt termination is an implicit transition to End;
                // cleanup still runs and a partial record is emitted.
                self.sequencer.abort();
                self.finish(event_loop);
            }
            WindowEvent::RedrawRequested => self.frame(event_loop),
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() => {
                self.handle_input(event, event_loop);
            }
            WindowEvent::Resized(size) => {
                if let Some(pixels) = &mut self.pixels {
                    if let Err(e) = pixels.resize_surface(size.width, size.height) {
                        eprintln!("Failed to resize surface: {e}");
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_exit {
            event_loop.exit();
        }
    }
}
