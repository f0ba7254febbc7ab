//! 功能元件模組

pub mod video_encoder;

pub use video_encoder::VideoEncoder;
