/// A continuously-recording circular sample buffer.
///
/// The producer (a hardware capture buffer, an engine microphone clip, or
/// [`CircularSampleBuffer`](crate::CircularSampleBuffer)) overwrites the
/// buffer in a loop and advances its write cursor; consumers never see the
/// cursor move backwards except by wrapping past `len()`.
pub trait CaptureSource {
    /// Total length of the circular buffer in samples. Zero until recording starts.
    fn len(&self) -> usize;

    /// Current write cursor, in `0..len()`.
    fn position(&self) -> usize;

    /// Copy `dst.len()` samples starting at `offset`, wrapping past the end of the buffer.
    fn read_wrapping(&self, offset: usize, dst: &mut [f32]);

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
