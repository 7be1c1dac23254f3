use anyhow::{bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A decoded mono audio buffer. Decoding and asset loading happen outside
/// the engine; the sink only plays what it is given.
#[derive(Debug, Clone)]
pub struct ToneBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl ToneBuffer {
    /// Synthesizes a sine beep with short linear attack/release ramps to
    /// avoid clicks at onset and offset.
    pub fn sine(freq_hz: f32, duration: Duration, sample_rate: u32) -> Self {
        let n = (duration.as_secs_f32() * sample_rate as f32) as usize;
        let ramp = (sample_rate as usize / 200).max(1); // 5 ms
        let samples = (0..n)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                let env = (i as f32 / ramp as f32)
                    .min((n - i) as f32 / ramp as f32)
                    .min(1.0);
                env * 0.5 * (std::f32::consts::TAU * freq_hz * t).sin()
            })
            .collect();
        Self {
            samples,
            sample_rate,
        }
    }

    /// Decodes a WAV asset, downmixing to mono. A missing or malformed
    /// file is a configuration error surfaced before the trial starts.
    pub fn from_wav(path: &Path) -> Result<Self> {
        let mut reader = hound::WavReader::open(path)
            .with_context(|| format!("failed to open tone file {}", path.display()))?;
        let spec = reader.spec();
        let channels = spec.channels as usize;
        let raw: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .context("bad float sample in tone file")?,
            hound::SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<_, _>>()
                    .context("bad int sample in tone file")?
            }
        };
        if raw.is_empty() {
            bail!("tone file {} holds no samples", path.display());
        }
        let samples = raw
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect();
        Ok(Self {
            samples,
            sample_rate: spec.sample_rate,
        })
    }

    fn resampled(&self, target_rate: u32) -> Vec<f32> {
        if target_rate == self.sample_rate || self.samples.is_empty() {
            return self.samples.clone();
        }
        let ratio = self.sample_rate as f64 / target_rate as f64;
        let n = (self.samples.len() as f64 / ratio) as usize;
        (0..n)
            .map(|i| {
                let pos = i as f64 * ratio;
                let lo = pos.floor() as usize;
                let hi = (lo + 1).min(self.samples.len() - 1);
                let frac = (pos - lo as f64) as f32;
                self.samples[lo] * (1.0 - frac) + self.samples[hi] * frac
            })
            .collect()
    }
}

/// Playback capability the sequencer talks to. One operation: start the
/// sink's buffer now. Concrete device handling lives behind this seam.
/// Not `Send`: cpal streams are pinned to the thread that built them, and
/// the trial model is single-threaded anyway.
pub trait ToneSink {
    fn play_now(&mut self) -> Result<()>;

    /// Output-device clock, if the backend exposes one.
    fn output_clock(&self) -> Option<Duration> {
        None
    }
}

impl ToneSink for Box<dyn ToneSink> {
    fn play_now(&mut self) -> Result<()> {
        (**self).play_now()
    }

    fn output_clock(&self) -> Option<Duration> {
        (**self).output_clock()
    }
}

const IDLE: usize = usize::MAX;

/// Plays a preloaded buffer through the default cpal output device.
///
/// The stream runs continuously and emits silence while idle; `play_now`
/// just rewinds the shared cursor, so triggering playback does not pay
/// stream setup latency.
pub struct CpalSink {
    _stream: cpal::Stream,
    cursor: Arc<AtomicUsize>,
    frames_played: Arc<AtomicU64>,
    sample_rate: u32,
}

impl CpalSink {
    pub fn new(buffer: &ToneBuffer) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .context("no audio output device")?;

        let supported = device
            .default_output_config()
            .context("no default output config")?;
        if supported.sample_format() != cpal::SampleFormat::F32 {
            bail!(
                "unsupported output sample format: {:?}",
                supported.sample_format()
            );
        }
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels() as usize;
        let config = cpal::StreamConfig {
            channels: supported.channels(),
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let samples: Arc<Vec<f32>> = Arc::new(buffer.resampled(sample_rate));
        let cursor = Arc::new(AtomicUsize::new(IDLE));
        let frames_played = Arc::new(AtomicU64::new(0));

        let cb_samples = Arc::clone(&samples);
        let cb_cursor = Arc::clone(&cursor);
        let cb_frames = Arc::clone(&frames_played);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let n_frames = data.len() / channels;
                    for frame in 0..n_frames {
                        let pos = cb_cursor.load(Ordering::Acquire);
                        let s = if pos < cb_samples.len() {
                            cb_cursor.store(pos + 1, Ordering::Release);
                            cb_samples[pos]
                        } else {
                            0.0
                        };
                        // Mono source replicated to every channel.
                        for ch in 0..channels {
                            data[frame * channels + ch] = s;
                        }
                    }
                    cb_frames.fetch_add(n_frames as u64, Ordering::Relaxed);
                },
                |err| eprintln!("audio stream error: {err}"),
                None,
            )
            .context("failed to build output stream")?;
        stream.play().context("failed to start output stream")?;

        Ok(Self {
            _stream: stream,
            cursor,
            frames_played,
            sample_rate,
        })
    }
}

impl ToneSink for CpalSink {
    fn play_now(&mut self) -> Result<()> {
        self.cursor.store(0, Ordering::Release);
        Ok(())
    }

    fn output_clock(&self) -> Option<Duration> {
        let frames = self.frames_played.load(Ordering::Relaxed);
        Some(Duration::from_secs_f64(
            frames as f64 / self.sample_rate as f64,
        ))
    }
}

/// Sink that records trigger instants without touching any device. Used in
/// tests and for the silent trial variant.
#[derive(Debug, Clone, Default)]
pub struct NullSink {
    plays: Arc<AtomicUsize>,
}

impl NullSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `play_now` has been invoked. Clones share the count.
    pub fn play_count(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }
}

impl ToneSink for NullSink {
    fn play_now(&mut self) -> Result<()> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
