use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, SendTimeoutError, Sender};
use tracing::{info, warn};

use crate::pipeline::config::{GeneratorConfig, SinkKind};
use crate::shared::{MIXFREQ, SLICE_LEN};

mod bass;
mod engine;
mod slice;
mod voice;
mod wav_sink;

pub use engine::Engine;
pub use slice::Slice;
pub use wav_sink::WavSink;

// slices queued ahead of the device; the bounded send is what paces us
const DEVICE_QUEUE_SLICES: usize = 4;

/// Where rendered s16 mono bytes go. Writes may block; that is the pacing.
pub trait PcmSink {
    fn write_slice(&mut self, bytes: &[u8]) -> anyhow::Result<()>;
    fn finish(&mut self) -> anyhow::Result<()>;
}

/// The consumer went away (closed pipe, dead stream). Ends a run quietly.
#[derive(Debug, thiserror::Error)]
#[error("audio sink closed")]
pub struct SinkClosed;

pub fn open_sink(config: &GeneratorConfig, project_dir: &Path) -> anyhow::Result<Box<dyn PcmSink>> {
    match config.sink {
        SinkKind::Stdout => {
            info!("streaming raw s16 mono @ {MIXFREQ} Hz to stdout");
            Ok(Box::new(PipeSink::new(io::stdout().lock())))
        }
        SinkKind::Wav => {
            let path = project_dir.join(&config.wav_path);
            info!(path = %path.display(), "rendering to wav");
            Ok(Box::new(WavSink::create(&path)?))
        }
        SinkKind::Device => Ok(Box::new(DeviceSink::open()?)),
    }
}

// ── Byte stream ───────────────────────────────────────────────────

// e.g. `funkgen | play -ts16 -r48000 -c1 -`
pub struct PipeSink<W: Write> {
    out: W,
}

impl<W: Write> PipeSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> PcmSink for PipeSink<W> {
    fn write_slice(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        match self.out.write_all(bytes) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Err(SinkClosed.into()),
            Err(e) => Err(e).context("failed to write pcm"),
        }
    }

    fn finish(&mut self) -> anyhow::Result<()> {
        match self.out.flush() {
            Err(e) if e.kind() != io::ErrorKind::BrokenPipe => Err(e).context("failed to flush pcm"),
            _ => Ok(()),
        }
    }
}

// ── Output device ─────────────────────────────────────────────────

// how long a full queue may sit untouched before we call the device gone
const DEVICE_STALL_TIMEOUT: Duration = Duration::from_secs(2);
// how long `finish` waits for the callback to play out what is queued
const DEVICE_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);
const DEVICE_POLL: Duration = Duration::from_millis(5);

/// Generator side of the channel into the audio callback. `dead` is raised by
/// the stream's error callback; once it is up every write is `SinkClosed`.
struct DeviceQueue {
    tx: Sender<Vec<i16>>,
    dead: Arc<AtomicBool>,
    stall_timeout: Duration,
}

impl DeviceQueue {
    fn new(tx: Sender<Vec<i16>>, dead: Arc<AtomicBool>, stall_timeout: Duration) -> Self {
        Self { tx, dead, stall_timeout }
    }

    fn is_dead(&self) -> bool {
        self.dead.load(Ordering::Relaxed)
    }

    // blocks while the queue is full, which is what paces us at real time
    fn push(&self, mut samples: Vec<i16>) -> anyhow::Result<()> {
        let started = Instant::now();
        loop {
            if self.is_dead() {
                return Err(SinkClosed.into());
            }
            match self.tx.send_timeout(samples, DEVICE_POLL) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Disconnected(_)) => return Err(SinkClosed.into()),
                Err(SendTimeoutError::Timeout(back)) => samples = back,
            }
            if started.elapsed() >= self.stall_timeout {
                warn!("output device stopped pulling audio");
                self.dead.store(true, Ordering::Relaxed);
                return Err(SinkClosed.into());
            }
        }
    }

    /// Wait for the callback to empty the queue. False if it never did.
    fn drain(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.tx.is_empty() {
            if self.is_dead() || Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(DEVICE_POLL);
        }
        true
    }
}

pub struct DeviceSink {
    queue: Option<DeviceQueue>,
    _stream: cpal::Stream,
}

impl DeviceSink {
    pub fn open() -> anyhow::Result<Self> {
        let host = cpal::default_host();
        let device = host.default_output_device().context("no default output device")?;
        let channels = find_channels(&device)?;

        let config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(MIXFREQ),
            buffer_size: cpal::BufferSize::Default,
        };

        let (tx, rx) = crossbeam_channel::bounded::<Vec<i16>>(DEVICE_QUEUE_SLICES);
        let dead = Arc::new(AtomicBool::new(false));
        let stream = build_output_stream(&device, &config, rx, channels as usize, dead.clone())?;
        stream.play().context("failed to play output stream")?;

        info!(channels, "playing on the default output device @ {MIXFREQ} Hz");
        Ok(Self {
            queue: Some(DeviceQueue::new(tx, dead, DEVICE_STALL_TIMEOUT)),
            _stream: stream,
        })
    }
}

impl PcmSink for DeviceSink {
    fn write_slice(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        let queue = self.queue.as_ref().ok_or(SinkClosed)?;
        let samples: Vec<i16> = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_ne_bytes([pair[0], pair[1]]))
            .collect();
        queue.push(samples)
    }

    fn finish(&mut self) -> anyhow::Result<()> {
        if let Some(queue) = self.queue.take() {
            // let the callback play what is queued before the stream drops
            if queue.drain(DEVICE_DRAIN_TIMEOUT) {
                let slice_ms = (SLICE_LEN as u64 * 1000) / MIXFREQ as u64;
                std::thread::sleep(Duration::from_millis(slice_ms * 2));
            } else {
                warn!("output device did not drain, dropping the tail");
            }
        }
        Ok(())
    }
}

// first f32 config that can run at our rate; we only need its channel count
fn find_channels(device: &cpal::Device) -> anyhow::Result<u16> {
    let supported = device
        .supported_output_configs()
        .context("failed to query output configs")?;
    for range in supported {
        if range.sample_format() == cpal::SampleFormat::F32
            && range.min_sample_rate().0 <= MIXFREQ
            && range.max_sample_rate().0 >= MIXFREQ
        {
            return Ok(range.channels());
        }
    }
    anyhow::bail!("output device cannot play f32 at {MIXFREQ} Hz")
}

fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    rx: Receiver<Vec<i16>>,
    channels: usize,
    dead: Arc<AtomicBool>,
) -> anyhow::Result<cpal::Stream> {
    let mut pending: Vec<i16> = Vec::with_capacity(SLICE_LEN);
    let mut pos = 0usize;

    let err_fn = move |err: cpal::StreamError| {
        warn!("audio output stream error: {err}");
        dead.store(true, Ordering::Relaxed);
    };

    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
            for frame in data.chunks_mut(channels) {
                if pos >= pending.len() {
                    pos = 0;
                    match rx.try_recv() {
                        Ok(next) => pending = next,
                        Err(_) => pending.clear(), // underrun, play silence
                    }
                }
                let sample = match pending.get(pos) {
                    Some(&s) => {
                        pos += 1;
                        s as f32 / 32_768.0
                    }
                    None => 0.0,
                };
                // mono into every channel
                for out in frame.iter_mut() {
                    *out = sample;
                }
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "reader hung up"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "reader hung up"))
        }
    }

    #[test]
    fn pipe_sink_passes_bytes_through() {
        let mut sink = PipeSink::new(Vec::new());
        sink.write_slice(&[1, 2, 3, 4]).unwrap();
        sink.write_slice(&[5, 6]).unwrap();
        sink.finish().unwrap();
        assert_eq!(sink.into_inner(), vec![1, 2, 3, 4, 5, 6]);
    }

    fn queue(cap: usize, stall: Duration) -> (DeviceQueue, Receiver<Vec<i16>>) {
        let (tx, rx) = crossbeam_channel::bounded(cap);
        (DeviceQueue::new(tx, Arc::new(AtomicBool::new(false)), stall), rx)
    }

    #[test]
    fn device_queue_passes_slices_to_the_callback() {
        let (queue, rx) = queue(2, Duration::from_secs(1));
        queue.push(vec![1, 2]).unwrap();
        queue.push(vec![3]).unwrap();
        assert_eq!(rx.try_recv().unwrap(), vec![1, 2]);
        assert_eq!(rx.try_recv().unwrap(), vec![3]);
        assert!(queue.drain(Duration::from_millis(50)));
    }

    #[test]
    fn stream_error_unblocks_a_full_queue() {
        let (queue, _rx) = queue(1, Duration::from_secs(30));
        queue.push(vec![0]).unwrap();

        let dead = queue.dead.clone();
        let flagger = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            dead.store(true, Ordering::Relaxed);
        });
        let started = Instant::now();
        let err = queue.push(vec![1]).unwrap_err();
        flagger.join().unwrap();
        assert!(err.is::<SinkClosed>());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn stalled_device_counts_as_closed() {
        let (queue, _rx) = queue(1, Duration::from_millis(50));
        queue.push(vec![0]).unwrap();
        let err = queue.push(vec![1]).unwrap_err();
        assert!(err.is::<SinkClosed>());
        assert!(queue.is_dead());
    }

    #[test]
    fn dropped_callback_counts_as_closed() {
        let (queue, rx) = queue(1, Duration::from_secs(30));
        drop(rx);
        assert!(queue.push(vec![0]).unwrap_err().is::<SinkClosed>());
    }

    #[test]
    fn drain_gives_up_at_the_deadline() {
        let (queue, _rx) = queue(1, Duration::from_secs(30));
        queue.push(vec![0]).unwrap();
        let started = Instant::now();
        assert!(!queue.drain(Duration::from_millis(50)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn broken_pipe_reports_sink_closed() {
        let mut sink = PipeSink::new(ClosedPipe);
        let err = sink.write_slice(&[0, 0]).unwrap_err();
        assert!(err.is::<SinkClosed>());
        assert!(sink.finish().is_ok());
    }
}
