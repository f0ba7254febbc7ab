use crate::component::VideoEncoder;
use crate::config::Config;
use crate::pause;
use anyhow::Result;
use console::{Term, style};
use log::error;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

pub fn run_video_encoder(
    term: &Term,
    shutdown_signal: &Arc<AtomicBool>,
    config: &mut Config,
) -> Result<()> {
    let mut encoder = VideoEncoder::new(config, Arc::clone(shutdown_signal));

    if let Err(e) = encoder.run() {
        error!("編碼失敗: {e:#}");
        eprintln!("{} {:#}", style("錯誤:").red().bold(), e);
    }

    pause(term)?;
    Ok(())
}
