use std::any::Any;

/// Upcast helper so boxed custom effects can be downcast to their concrete type.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A user-supplied audio effect inserted into a native effect pipeline.
///
/// The native pipeline calls back into `process` on whatever thread drives
/// the stream, once per frame, in pipeline order. Implementations must not
/// block and must not panic: a panic is caught at the boundary and the frame
/// is silenced.
pub trait CustomEffect: AsAny + Send {
    /// Process one frame of interleaved samples in place.
    fn process(&mut self, samples: &mut [f32], channels: u16, sample_rate: u32);

    /// Short label used in log lines.
    fn name(&self) -> &str {
        "custom"
    }
}
