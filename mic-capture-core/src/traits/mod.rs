pub mod frame_consumer;
pub mod peripheral;
pub mod pipeline_delegate;
pub mod platform;
