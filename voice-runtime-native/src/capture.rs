//! Bridges between engine audio buffers and native streams.
//!
//! Both run on the host's audio tick. Native failures here are logged and
//! degrade to dropped or silent frames; they never panic.

use voice_runtime_core::models::config::CapturePyramidConfig;
use voice_runtime_core::models::error::RuntimeError;
use voice_runtime_core::models::stream::DrainOutcome;
use voice_runtime_core::processing::capture_ring::CaptureRingBuffer;
use voice_runtime_core::traits::capture_source::CaptureSource;

use crate::stream::decoder::Decoder;
use crate::stream::encoder::Encoder;

/// Feeds a recording microphone buffer into an encoder, one tick at a time.
#[derive(Debug)]
pub struct MicrophoneCapture {
    ring: CaptureRingBuffer,
    failed_pushes: u64,
}

impl MicrophoneCapture {
    pub fn new(config: CapturePyramidConfig) -> Result<Self, RuntimeError> {
        Ok(Self {
            ring: CaptureRingBuffer::new(config)?,
            failed_pushes: 0,
        })
    }

    pub fn ring(&self) -> &CaptureRingBuffer {
        &self.ring
    }

    /// Chunks the encoder rejected since creation or the last reset.
    pub fn failed_pushes(&self) -> u64 {
        self.failed_pushes
    }

    /// Start reading from the source's current cursor, skipping older audio.
    pub fn sync_to<S: CaptureSource + ?Sized>(&mut self, source: &S) {
        self.ring.sync_to(source);
    }

    /// Drain everything new in `source` into `encoder`.
    ///
    /// A chunk the encoder rejects is logged and counted; the tick continues
    /// with the next chunk. Fails only with `BufferCorrupted`, after which
    /// [`reset`](Self::reset) recovers.
    pub fn tick<S: CaptureSource + ?Sized>(
        &mut self,
        source: &S,
        encoder: &mut Encoder,
    ) -> Result<DrainOutcome, RuntimeError> {
        let mut failed = 0u64;
        let outcome = self.ring.drain(source, |chunk| {
            if let Err(e) = encoder.push_samples(chunk) {
                log::error!("Encoder {} rejected {} samples: {}", encoder.id(), chunk.len(), e);
                failed += 1;
            }
        });
        self.failed_pushes += failed;
        outcome
    }

    /// Rebuild the buffer pyramid and rewind.
    pub fn reset(&mut self) -> Result<(), RuntimeError> {
        self.failed_pushes = 0;
        self.ring.reset()
    }
}

/// Fills engine playback buffers from a decoder.
#[derive(Debug, Default)]
pub struct PlaybackBuffer {
    underruns: u64,
}

impl PlaybackBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ticks where the decoder could not fill the whole buffer.
    pub fn underruns(&self) -> u64 {
        self.underruns
    }

    /// Fill `out` with decoded samples, zero-filling whatever the decoder
    /// could not supply. Returns the number of decoded samples.
    pub fn fill(&mut self, decoder: &mut Decoder, out: &mut [f32]) -> usize {
        let mut filled = 0;
        while filled < out.len() {
            match decoder.pop_samples(&mut out[filled..]) {
                Ok(0) | Err(RuntimeError::NoData) => break,
                Ok(count) => filled += count,
                Err(e) => {
                    log::error!("Decoder {} failed during playback: {}", decoder.id(), e);
                    break;
                }
            }
        }

        if filled < out.len() {
            out[filled..].fill(0.0);
            self.underruns += 1;
        }
        filled
    }
}
