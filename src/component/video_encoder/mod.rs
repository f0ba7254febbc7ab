//! 影片編碼元件
//!
//! 啟動 ffmpeg 子程序，解析 stderr 取得進度並推送事件

mod encode_session;
mod ffmpeg_command;
mod main;
mod progress_parser;
mod token_reader;

pub use encode_session::{
    EncodeSession, EncodeSummary, EventGate, ProgressStream, StreamMonitor, monitor_stream,
};
pub use ffmpeg_command::{EncodeRequest, FfmpegCommand, generate_destination_path};
pub use main::VideoEncoder;
pub use progress_parser::{
    ProgressEvent, ProgressEventKind, ProgressParser, ProgressState, normalize_log_block,
};
pub use token_reader::TokenReader;
