use super::encode_session::{EncodeSession, EncodeSummary, ProgressStream};
use super::ffmpeg_command::{EncodeRequest, generate_destination_path};
use super::progress_parser::{ProgressEvent, ProgressEventKind};
use crate::config::Config;
use crate::config::save::{add_recent_path, save_settings};
use crate::tools::{ensure_parent_directory_exists, format_ms, validate_encode_paths};
use anyhow::Result;
use console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Select};
use indicatif::{DecimalBytes, ProgressBar, ProgressStyle};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

/// 進度條的刻度數
const PROGRESS_SCALE: u64 = 1000;
const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub struct VideoEncoder<'a> {
    config: &'a mut Config,
    shutdown_signal: Arc<AtomicBool>,
}

impl<'a> VideoEncoder<'a> {
    pub const fn new(config: &'a mut Config, shutdown_signal: Arc<AtomicBool>) -> Self {
        Self {
            config,
            shutdown_signal,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        println!("{}", style("=== 影片編碼 ===").cyan().bold());

        let input = self.prompt_input_path()?;
        let output = self.prompt_output_path(&input)?;

        validate_encode_paths(&input, &output)?;
        ensure_parent_directory_exists(&output)?;
        self.remember_input(&input);

        let encoder = &self.config.settings.encoder;
        let request = EncodeRequest::new(&input, &output, encoder.encoder_args.clone());

        self.shutdown_signal.store(false, Ordering::SeqCst);
        println!("{}", style("取得影片資訊中...").dim());
        let (session, stream) = EncodeSession::start(&request, encoder)?;

        if cancel_on_shutdown(&session, &self.shutdown_signal) {
            println!("{}", style("已要求停止編碼").yellow());
        }
        let summary = self.watch(session, stream)?;
        self.shutdown_signal.store(false, Ordering::SeqCst);

        if summary.cancelled {
            remove_incomplete_output(&output);
        }
        print_summary(&summary, &output);

        Ok(())
    }

    fn prompt_input_path(&self) -> Result<PathBuf> {
        let recent = &self.config.settings.recent_paths;
        if !recent.is_empty() {
            let mut items: Vec<String> = recent.clone();
            items.push("輸入新路徑...".to_string());

            let selection = Select::with_theme(&ColorfulTheme::default())
                .with_prompt("選擇輸入影片")
                .items(&items)
                .default(0)
                .interact()?;

            if selection < recent.len() {
                return Ok(PathBuf::from(&recent[selection]));
            }
        }

        let path: String = Input::new()
            .with_prompt("請輸入影片路徑")
            .interact_text()?;
        Ok(PathBuf::from(clean_path_input(&path)))
    }

    fn prompt_output_path(&self, input: &Path) -> Result<PathBuf> {
        let suffix = &self.config.settings.encoder.output_suffix;
        let default_output = generate_destination_path(input, suffix);

        let path: String = Input::new()
            .with_prompt("輸出檔案")
            .default(default_output.display().to_string())
            .interact_text()?;
        Ok(PathBuf::from(clean_path_input(&path)))
    }

    fn remember_input(&mut self, input: &Path) {
        add_recent_path(&mut self.config.settings, &input.display().to_string());
        if let Err(e) = save_settings(&self.config.settings) {
            warn!("無法儲存最近使用路徑: {e:#}");
        }
    }

    fn watch(&self, session: EncodeSession, stream: ProgressStream) -> Result<EncodeSummary> {
        let progress_bar = ProgressBar::new(PROGRESS_SCALE);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent:>3}% {msg}")
                .expect("Invalid progress bar template")
                .progress_chars("#>-"),
        );
        progress_bar.set_message("分析中...");

        loop {
            if cancel_on_shutdown(&session, &self.shutdown_signal) {
                progress_bar.println(style("已要求停止編碼").yellow().to_string());
            }

            match stream.recv_timeout(POLL_INTERVAL) {
                Ok(event) => render_event(&progress_bar, &event),
                Err(RecvTimeoutError::Timeout) => progress_bar.tick(),
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        progress_bar.finish_and_clear();
        Ok(session.wait()?)
    }
}

/// 收到中斷信號且尚未取消時取消編碼，回傳這次是否送出取消
fn cancel_on_shutdown(session: &EncodeSession, shutdown_signal: &AtomicBool) -> bool {
    if !shutdown_signal.load(Ordering::SeqCst) || session.is_cancelled() {
        return false;
    }
    session.cancel();
    true
}

fn render_event(progress_bar: &ProgressBar, event: &ProgressEvent) {
    let position = (event.display_fraction() * PROGRESS_SCALE as f64).round() as u64;
    progress_bar.set_position(position);

    let timing = match event.fraction {
        Some(_) => format!("{} / {}", format_ms(event.elapsed_ms), format_ms(event.total_ms)),
        None => format!("{} / ??:??:??", format_ms(event.elapsed_ms)),
    };
    let phase = if event.is_encoding { "編碼中" } else { "分析中" };
    progress_bar.set_message(format!("{timing}  {phase}"));

    if event.kind == ProgressEventKind::PhaseTransition {
        progress_bar.println(style("開始編碼").green().to_string());
    }

    if let Some(block) = &event.latest_block {
        for line in block.lines().filter(|l| !l.trim().is_empty()) {
            progress_bar.println(style(line.trim()).dim().to_string());
        }
    }
}

fn print_summary(summary: &EncodeSummary, output: &Path) {
    println!();
    println!("{}", style("=== 編碼結果 ===").cyan().bold());

    if summary.cancelled {
        println!("  {}", style("已取消").yellow());
        return;
    }

    if summary.never_started_encoding() {
        println!("  {}", style("編碼器沒有進入編碼階段，請檢查參數或輸入檔").red());
    }

    match summary.exit_code {
        Some(code) => println!("  結束代碼: {code}"),
        None => println!("  結束代碼: 未知"),
    }

    if summary.success {
        println!("  {} {}", style("完成:").green(), describe_output(output));
        info!("編碼完成: {}", output.display());
    } else {
        println!("  {}", style("編碼失敗").red());
    }
}

/// `路徑 (大小)`，讀不到檔案資訊時大小為 0
fn describe_output(output: &Path) -> String {
    let size = fs::metadata(output).map(|m| m.len()).unwrap_or(0);
    format!("{} ({})", output.display(), DecimalBytes(size))
}

fn remove_incomplete_output(output: &Path) {
    if !output.exists() {
        return;
    }
    match fs::remove_file(output) {
        Ok(()) => info!("已刪除中斷的輸出檔案: {}", output.display()),
        Err(e) => warn!("無法刪除中斷的輸出檔案 {}: {e}", output.display()),
    }
}

/// 去除拖放路徑時常見的引號與空白
fn clean_path_input(raw: &str) -> String {
    raw.trim().trim_matches(|c| c == '"' || c == '\'').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_path_input() {
        assert_eq!(clean_path_input("  \"/videos/a b.mp4\" "), "/videos/a b.mp4");
        assert_eq!(clean_path_input("'/videos/c.mkv'"), "/videos/c.mkv");
        assert_eq!(clean_path_input("/videos/d.mov"), "/videos/d.mov");
    }

    #[cfg(unix)]
    #[test]
    fn test_shutdown_before_watch_cancels_session() {
        use crate::config::EncoderSettings;
        use crate::tools::MediaDuration;

        let settings = EncoderSettings {
            ffmpeg_binary: "sh".to_string(),
            global_prefix: vec!["-c".to_string(), "exec sleep 30".to_string()],
            encoder_args: vec![],
            ..EncoderSettings::default()
        };
        let request = EncodeRequest::new(Path::new("in.mp4"), Path::new("out.mp4"), vec![]);
        let (session, mut stream) =
            EncodeSession::start_with_duration(&request, &settings, MediaDuration::from_millis(1_000))
                .unwrap();

        let shutdown_signal = AtomicBool::new(true);
        assert!(cancel_on_shutdown(&session, &shutdown_signal));
        assert!(!cancel_on_shutdown(&session, &shutdown_signal));
        assert!(stream.next().is_none());

        let summary = session.wait().unwrap();
        assert!(summary.cancelled);
        assert!(!summary.success);
    }

    #[test]
    fn test_describe_output_size() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("done.mp4");
        fs::write(&output, vec![0u8; 2_000]).unwrap();
        assert!(describe_output(&output).ends_with("(2.00 kB)"));
        assert!(describe_output(&dir.path().join("missing.mp4")).ends_with("(0 B)"));
    }

    #[test]
    fn test_remove_incomplete_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("partial.mp4");
        fs::write(&output, b"partial").unwrap();
        remove_incomplete_output(&output);
        assert!(!output.exists());
        remove_incomplete_output(&output);
    }
}
