use voice_runtime_core::models::config::StreamConfiguration;
use voice_runtime_core::models::error::RuntimeError;
use voice_runtime_core::models::state::HandleKind;
use voice_runtime_core::models::stream::StreamId;
use voice_runtime_core::pipeline::effect_pipeline::EffectPipeline;

use crate::pipeline::NativePipeline;
use crate::runtime::LibraryRuntime;
use crate::stream::MediaStream;

/// Native voice decoder: packets in, PCM out, with an effect pipeline
/// applied to the decoded PCM.
#[derive(Debug)]
pub struct Decoder {
    stream: MediaStream,
}

impl Decoder {
    /// Create a decoder, initializing `runtime` if needed.
    pub fn new(runtime: &LibraryRuntime, config: StreamConfiguration) -> Result<Self, RuntimeError> {
        let stream = MediaStream::open(
            runtime,
            HandleKind::Decoder,
            "vx_decoder_create",
            |api| api.decoder_create,
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

    /// Feed one encoded packet.
    pub fn push_packet(&mut self, packet: &[u8]) -> Result<(), RuntimeError> {
        let push = self.stream.api().decoder_push_packet;
        self.stream.invoke("vx_decoder_push_packet", |raw| unsafe {
            push(raw, packet.as_ptr(), packet.len())
        })
    }

    /// Copy up to `buffer.len()` decoded samples and return how many were written.
    ///
    /// `Err(NoData)` when nothing is decoded yet.
    pub fn pop_samples(&mut self, buffer: &mut [f32]) -> Result<usize, RuntimeError> {
        let pop = self.stream.api().decoder_pop_samples;
        let mut written = 0usize;
        self.stream.invoke("vx_decoder_pop_samples", |raw| unsafe {
            pop(raw, buffer.as_mut_ptr(), buffer.len(), &mut written)
        })?;
        Ok(written.min(buffer.len()))
    }

    /// Remove all effects and free the native decoder. Idempotent; also runs on drop.
    pub fn dispose(&mut self) -> bool {
        self.stream.dispose()
    }
}
