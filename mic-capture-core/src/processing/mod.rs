pub mod normalizer;
pub mod sample_buffer;
