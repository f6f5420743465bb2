use voice_runtime_core::models::config::StreamConfiguration;
use voice_runtime_core::models::error::RuntimeError;
use voice_runtime_core::models::state::HandleKind;
use voice_runtime_core::models::stream::StreamId;
use voice_runtime_core::pipeline::effect_pipeline::EffectPipeline;

use crate::pipeline::NativePipeline;
use crate::runtime::LibraryRuntime;
use crate::stream::MediaStream;

/// Native voice encoder: PCM in, packets out, with an effect pipeline
/// applied to the PCM before encoding.
#[derive(Debug)]
pub struct Encoder {
    stream: MediaStream,
}

impl Encoder {
    /// Create an encoder, initializing `runtime` if needed.
    pub fn new(runtime: &LibraryRuntime, config: StreamConfiguration) -> Result<Self, RuntimeError> {
        let stream = MediaStream::open(
            runtime,
            HandleKind::Encoder,
            "vx_encoder_create",
            |api| api.encoder_create,
            config,
        )?;
        Ok(Self { stream })
    }

    pub fn id(&self) -> StreamId {
        self.stream.id()
    }

    pub fn config(&self) -> StreamConfiguration {
        self.stream.config()
    }

    pub fn pipeline(&self) -> &EffectPipeline<NativePipeline> {
        self.stream.pipeline()
    }

    pub fn pipeline_mut(&mut self) -> &mut EffectPipeline<NativePipeline> {
        self.stream.pipeline_mut()
    }

    pub fn is_alive(&self) -> bool {
        self.stream.is_alive()
    }

    /// Feed interleaved PCM samples.
    pub fn push_samples(&mut self, samples: &[f32]) -> Result<(), RuntimeError> {
        let push = self.stream.api().encoder_push_samples;
        self.stream.invoke("vx_encoder_push_samples", |raw| unsafe {
            push(raw, samples.as_ptr(), samples.len())
        })
    }

    /// Copy the next encoded packet into `buffer` and return its length.
    ///
    /// `Err(NoData)` when no packet is ready.
    pub fn pop_packet(&mut self, buffer: &mut [u8]) -> Result<usize, RuntimeError> {
        let pop = self.stream.api().encoder_pop_packet;
        let mut written = 0usize;
        self.stream.invoke("vx_encoder_pop_packet", |raw| unsafe {
            pop(raw, buffer.as_mut_ptr(), buffer.len(), &mut written)
        })?;
        Ok(written.min(buffer.len()))
    }

    /// Remove all effects and free the native encoder. Idempotent; also runs on drop.
    pub fn dispose(&mut self) -> bool {
        self.stream.dispose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::test_support::fake_runtime;
    use std::sync::atomic::AtomicBool;
    use std::sync::atomic::Ordering::SeqCst;
    use std::sync::{mpsc, Arc};
    use std::thread;
    use std::time::Duration;
    use voice_runtime_core::models::effect::{ApmConfig, EffectCategory, EffectKind, VadConfig};
    use voice_runtime_core::traits::custom_effect::CustomEffect;

    struct Gain(f32);

    impl CustomEffect for Gain {
        fn process(&mut self, samples: &mut [f32], _channels: u16, _sample_rate: u32) {
            for sample in samples {
                *sample *= self.0;
            }
        }
    }

    /// Signals when native code calls it, then holds the call open for a while.
    struct Stall {
        entered: mpsc::Sender<()>,
        released: Arc<AtomicBool>,
        saw_release: Arc<AtomicBool>,
    }

    impl CustomEffect for Stall {
        fn process(&mut self, _samples: &mut [f32], _channels: u16, _sample_rate: u32) {
            let _ = self.entered.send(());
            thread::sleep(Duration::from_millis(100));
            if self.released.load(SeqCst) {
                self.saw_release.store(true, SeqCst);
            }
        }
    }

    fn decode_packet(packet: &[u8]) -> Vec<f32> {
        packet
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()
    }

    #[test]
    fn creating_an_encoder_initializes_runtime_lazily() {
        let (runtime, stats) = fake_runtime();
        let encoder = Encoder::new(&runtime, StreamConfiguration::default()).unwrap();

        assert!(runtime.is_initialized());
        assert!(encoder.is_alive());
        assert_eq!(stats.library_creates.load(SeqCst), 1);
    }

    #[test]
    fn invalid_format_is_rejected_before_native_call() {
        let (runtime, _stats) = fake_runtime();
        let config = StreamConfiguration {
            sample_rate: 0,
            channels: 1,
        };
        assert!(matches!(
            Encoder::new(&runtime, config),
            Err(RuntimeError::ConfigurationFailed(_))
        ));
        assert!(!runtime.is_initialized());
    }

    #[test]
    fn push_then_pop_round_trips_through_pipeline() {
        let (runtime, stats) = fake_runtime();
        let mut encoder = Encoder::new(&runtime, StreamConfiguration::default()).unwrap();
        encoder.pipeline_mut().insert(EffectKind::custom(Gain(0.5)), 0).unwrap();

        encoder.push_samples(&[0.2, 0.4, -0.8]).unwrap();
        let mut packet = [0u8; 64];
        let len = encoder.pop_packet(&mut packet).unwrap();

        let decoded = decode_packet(&packet[..len]);
        for (actual, expected) in decoded.iter().zip([0.1f32, 0.2, -0.4]) {
            approx::assert_abs_diff_eq!(*actual, expected, epsilon = 1e-6);
        }
        assert_eq!(stats.effect_callbacks.load(SeqCst), 1);
        assert_eq!(encoder.pop_packet(&mut packet), Err(RuntimeError::NoData));
    }

    #[test]
    fn small_buffer_surfaces_native_error() {
        let (runtime, _stats) = fake_runtime();
        let mut encoder = Encoder::new(&runtime, StreamConfiguration::default()).unwrap();
        encoder.push_samples(&[0.0; 8]).unwrap();

        let mut tiny = [0u8; 4];
        match encoder.pop_packet(&mut tiny) {
            Err(RuntimeError::NativeCallFailed { call, code, message }) => {
                assert_eq!(call, "vx_encoder_pop_packet");
                assert_eq!(code, -5);
                assert_eq!(message, "buffer too small");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn pipeline_follows_native_order() {
        let (runtime, _stats) = fake_runtime();
        let mut encoder = Encoder::new(&runtime, StreamConfiguration::default()).unwrap();
        let pipeline = encoder.pipeline_mut();

        let a = pipeline.insert(EffectKind::Apm(ApmConfig::default()), 0).unwrap();
        let b = pipeline.insert(EffectKind::Vad(VadConfig::default()), 0).unwrap();
        let ids: Vec<_> = pipeline.effects().iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec![b, a]);

        // Past the end is rejected natively; appending is always accepted.
        assert!(pipeline.move_effect(b, 5).is_err());
        let append = pipeline.next_available_index();
        pipeline.move_effect(b, append).unwrap();
        let ids: Vec<_> = pipeline.effects().iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec![a, b]);
        assert_eq!(pipeline.get(b).unwrap().index(), 1);
    }

    #[test]
    fn rejected_insert_leaves_pipeline_unchanged() {
        let (runtime, _stats) = fake_runtime();
        let mut encoder = Encoder::new(&runtime, StreamConfiguration::default()).unwrap();
        let bad = VadConfig {
            sensitivity: 3.0,
            hangover_ms: 100,
        };

        let err = encoder.pipeline_mut().insert(EffectKind::Vad(bad), 0).unwrap_err();
        assert!(matches!(err, RuntimeError::NativeCallFailed { code: -7, .. }));
        assert!(encoder.pipeline().is_empty());
    }

    #[test]
    fn failed_remove_keeps_effect() {
        let (runtime, stats) = fake_runtime();
        let mut encoder = Encoder::new(&runtime, StreamConfiguration::default()).unwrap();
        let id = encoder
            .pipeline_mut()
            .insert(EffectKind::Apm(ApmConfig::default()), 0)
            .unwrap();

        stats.fail_removes.store(true, SeqCst);
        assert!(encoder.pipeline_mut().remove(id).is_err());
        assert_eq!(encoder.pipeline().len(), 1);

        stats.fail_removes.store(false, SeqCst);
        encoder.pipeline_mut().remove(id).unwrap();
        assert!(encoder.pipeline().is_empty());
    }

    #[test]
    fn effects_by_kind_and_custom_lookup() {
        let (runtime, _stats) = fake_runtime();
        let mut encoder = Encoder::new(&runtime, StreamConfiguration::default()).unwrap();
        let pipeline = encoder.pipeline_mut();
        pipeline.insert(EffectKind::Apm(ApmConfig::default()), 0).unwrap();
        let gain = pipeline.insert(EffectKind::custom(Gain(2.0)), 1).unwrap();

        let groups = encoder.pipeline().effects_by_kind();
        assert_eq!(groups[&EffectCategory::Apm].len(), 1);
        assert_eq!(groups[&EffectCategory::Custom][0].id(), gain);
        assert!(!groups.contains_key(&EffectCategory::Vad));

        let gains = encoder.pipeline().custom_effects::<Gain>();
        approx::assert_abs_diff_eq!(gains[0].1 .0, 2.0);
    }

    #[test]
    fn dispose_frees_effects_pipeline_and_stream_once() {
        let (runtime, stats) = fake_runtime();
        let mut encoder = Encoder::new(&runtime, StreamConfiguration::default()).unwrap();
        encoder
            .pipeline_mut()
            .insert(EffectKind::Apm(ApmConfig::default()), 0)
            .unwrap();

        assert!(encoder.dispose());
        assert!(!encoder.dispose());
        drop(encoder);

        // Pipeline and encoder.
        assert_eq!(stats.object_frees.load(SeqCst), 2);
    }

    #[test]
    fn drop_after_runtime_release_skips_native_frees() {
        let (runtime, stats) = fake_runtime();
        let encoder = Encoder::new(&runtime, StreamConfiguration::default()).unwrap();
        runtime.release();

        assert!(!encoder.is_alive());
        drop(encoder);
        assert_eq!(stats.object_frees.load(SeqCst), 0);
    }

    #[test]
    fn release_waits_for_in_flight_native_call() {
        let (runtime, stats) = fake_runtime();
        let mut encoder = Encoder::new(&runtime, StreamConfiguration::default()).unwrap();
        let (entered, entered_rx) = mpsc::channel();
        let released = Arc::new(AtomicBool::new(false));
        let saw_release = Arc::new(AtomicBool::new(false));
        encoder
            .pipeline_mut()
            .insert(
                EffectKind::custom(Stall {
                    entered,
                    released: Arc::clone(&released),
                    saw_release: Arc::clone(&saw_release),
                }),
                0,
            )
            .unwrap();

        thread::scope(|scope| {
            let runtime = &runtime;
            let released = &released;
            scope.spawn(move || {
                entered_rx.recv().unwrap();
                assert!(runtime.release());
                released.store(true, SeqCst);
            });
            encoder.push_samples(&[0.1; 4]).unwrap();
        });

        assert!(!saw_release.load(SeqCst));
        assert_eq!(stats.shutdowns.load(SeqCst), 1);
        assert!(!encoder.is_alive());
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "not alive"))]
    fn push_after_dispose_is_usage_error() {
        let (runtime, _stats) = fake_runtime();
        let mut encoder = Encoder::new(&runtime, StreamConfiguration::default()).unwrap();
        encoder.dispose();

        let err = encoder.push_samples(&[0.0; 4]).unwrap_err();
        assert_eq!(
            err,
            RuntimeError::HandleNotAlive {
                kind: HandleKind::Encoder
            }
        );
    }
}
