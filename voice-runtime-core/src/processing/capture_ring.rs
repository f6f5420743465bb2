use crate::models::config::CapturePyramidConfig;
use crate::models::error::RuntimeError;
use crate::models::stream::DrainOutcome;
use crate::traits::capture_source::CaptureSource;

/// One chunk size of the pyramid with its redundant instances.
#[derive(Debug)]
struct SizeClass {
    size: usize,
    instances: Vec<Vec<f32>>,
    next: usize,
}

/// Drains a continuously-overwritten circular source into fixed power-of-two chunks.
///
/// Each tick reads the source's write cursor, computes how much is unread
/// since the last tick and hands out chunks from the largest size class to
/// the smallest. Whatever is left below the smallest chunk size stays in the
/// source for the next tick, so no sample is skipped or delivered twice, also
/// across wraparound of the source.
///
/// Each size class cycles through `redundancy` buffers, so a consumer still
/// holding chunk *N* is not overwritten until chunk *N + redundancy* of the
/// same size is needed.
#[derive(Debug)]
pub struct CaptureRingBuffer {
    config: CapturePyramidConfig,
    classes: Vec<SizeClass>,
    position: usize,
    source_length: usize,
    delivered_samples: u64,
}

impl CaptureRingBuffer {
    pub fn new(config: CapturePyramidConfig) -> Result<Self, RuntimeError> {
        config.validate()?;
        let classes = allocate_pyramid(&config)?;
        Ok(Self {
            config,
            classes,
            position: 0,
            source_length: 0,
            delivered_samples: 0,
        })
    }

    pub fn config(&self) -> &CapturePyramidConfig {
        &self.config
    }

    /// Read cursor into the source.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn delivered_samples(&self) -> u64 {
        self.delivered_samples
    }

    /// Whether the pyramid failed to set up (or was torn down) and needs a [`reset`](Self::reset).
    pub fn is_corrupted(&self) -> bool {
        self.classes.is_empty()
            || self
                .classes
                .iter()
                .any(|class| class.instances.is_empty() || class.instances.iter().any(|b| b.len() != class.size))
    }

    /// Rebuild the pyramid and rewind the read cursor.
    pub fn reset(&mut self) -> Result<(), RuntimeError> {
        self.classes.clear();
        self.classes = allocate_pyramid(&self.config)?;
        self.position = 0;
        self.source_length = 0;
        self.delivered_samples = 0;
        Ok(())
    }

    /// Skip everything the source has recorded so far.
    pub fn sync_to<S: CaptureSource + ?Sized>(&mut self, source: &S) {
        self.source_length = source.len();
        self.position = if self.source_length == 0 {
            0
        } else {
            source.position() % self.source_length
        };
    }

    /// Unread samples in `source`, without consuming them.
    pub fn available<S: CaptureSource + ?Sized>(&self, source: &S) -> usize {
        let length = source.len();
        if length == 0 || length != self.source_length && self.source_length != 0 {
            return 0;
        }
        (length + source.position() % length - self.position % length) % length
    }

    /// Deliver every complete chunk available in `source` to `consumer`, in order.
    pub fn drain<S, F>(&mut self, source: &S, mut consumer: F) -> Result<DrainOutcome, RuntimeError>
    where
        S: CaptureSource + ?Sized,
        F: FnMut(&[f32]),
    {
        if self.is_corrupted() {
            return Err(RuntimeError::BufferCorrupted(
                "capture pyramid has no usable buffers".into(),
            ));
        }

        let length = source.len();
        if length == 0 {
            return Ok(DrainOutcome::NoData);
        }
        if length != self.source_length {
            if self.source_length != 0 {
                log::info!(
                    "Capture source length changed from {} to {}, restarting at 0",
                    self.source_length,
                    length
                );
            }
            self.source_length = length;
            self.position = 0;
        }

        let new_position = source.position() % length;
        if new_position == self.position {
            return Ok(DrainOutcome::NoData);
        }

        let mut available = (length + new_position - self.position) % length;
        let mut chunks = 0;
        let mut samples = 0;

        for class in self.classes.iter_mut() {
            while available >= class.size {
                let buffer = &mut class.instances[class.next];
                source.read_wrapping(self.position, buffer);
                self.position = (self.position + class.size) % length;
                consumer(buffer);

                class.next = (class.next + 1) % class.instances.len();
                available -= class.size;
                chunks += 1;
                samples += class.size;
            }
        }

        self.delivered_samples += samples as u64;
        Ok(DrainOutcome::Delivered {
            chunks,
            samples,
            carried_over: available,
        })
    }
}

fn allocate_pyramid(config: &CapturePyramidConfig) -> Result<Vec<SizeClass>, RuntimeError> {
    let mut classes = Vec::new();
    for size in config.chunk_sizes() {
        let mut instances = Vec::new();
        for _ in 0..config.redundancy {
            let mut buffer: Vec<f32> = Vec::new();
            buffer.try_reserve_exact(size).map_err(|e| {
                RuntimeError::BufferCorrupted(format!(
                    "failed to allocate {}-sample capture buffer: {}",
                    size, e
                ))
            })?;
            buffer.resize(size, 0.0);
            instances.push(buffer);
        }
        classes.push(SizeClass {
            size,
            instances,
            next: 0,
        });
    }
    Ok(classes)
}
