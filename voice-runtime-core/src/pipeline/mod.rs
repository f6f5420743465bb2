pub mod effect_pipeline;
