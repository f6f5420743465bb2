use crate::traits::capture_source::CaptureSource;

/// Fixed-length circular sample buffer with a monotonically wrapping write cursor.
///
/// Models a recording microphone clip: writes overwrite the oldest samples
/// and advance the cursor, nothing is ever "consumed". Readers track their own
/// position (see [`CaptureRingBuffer`](crate::CaptureRingBuffer)).
///
/// For cross-thread use wrap in `Arc<parking_lot::Mutex<CircularSampleBuffer>>`.
#[derive(Debug)]
pub struct CircularSampleBuffer {
    buffer: Vec<f32>,
    write_index: usize,
    total_written: u64,
}

impl CircularSampleBuffer {
    pub fn new(length: usize) -> Self {
        Self {
            buffer: vec![0.0; length],
            write_index: 0,
            total_written: 0,
        }
    }

    /// Write samples at the cursor, wrapping past the end.
    ///
    /// If `samples` is longer than the buffer only the last `len()` samples
    /// survive, but the cursor still advances by the full count.
    pub fn write(&mut self, samples: &[f32]) {
        let length = self.buffer.len();
        if samples.is_empty() || length == 0 {
            return;
        }

        let skip = samples.len().saturating_sub(length);
        let start = (self.write_index + skip) % length;
        copy_wrapping_into(&mut self.buffer, start, &samples[skip..]);

        self.write_index = (self.write_index + samples.len()) % length;
        self.total_written += samples.len() as u64;
    }

    /// Total samples ever written, including overwritten ones.
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Zero the buffer and rewind the cursor.
    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_index = 0;
        self.total_written = 0;
    }
}

impl CaptureSource for CircularSampleBuffer {
    fn len(&self) -> usize {
        self.buffer.len()
    }

    fn position(&self) -> usize {
        self.write_index
    }

    fn read_wrapping(&self, offset: usize, dst: &mut [f32]) {
        let length = self.buffer.len();
        if length == 0 {
            dst.fill(0.0);
            return;
        }

        let mut cursor = offset % length;
        let mut filled = 0;
        while filled < dst.len() {
            let run = (length - cursor).min(dst.len() - filled);
            dst[filled..filled + run].copy_from_slice(&self.buffer[cursor..cursor + run]);
            filled += run;
            cursor = (cursor + run) % length;
        }
    }
}

/// Copy `src` into `dst` starting at `start`, wrapping. `src` must not exceed `dst`.
fn copy_wrapping_into(dst: &mut [f32], start: usize, src: &[f32]) {
    let head = (dst.len() - start).min(src.len());
    dst[start..start + head].copy_from_slice(&src[..head]);
    let tail = src.len() - head;
    dst[..tail].copy_from_slice(&src[head..]);
}
