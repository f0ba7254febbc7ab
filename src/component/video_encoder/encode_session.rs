//! 編碼工作與進度監看
//!
//! 每個工作一條背景執行緒，逐字解析 ffmpeg 的 stderr，
//! 透過 channel 推送不可變的 [`ProgressEvent`] 快照給呼叫端。

use super::ffmpeg_command::{EncodeRequest, FfmpegCommand};
use super::progress_parser::{ProgressEvent, ProgressParser, ProgressState};
use super::token_reader::TokenReader;
use crate::config::EncoderSettings;
use crate::error::{EncodeError, LaunchError, StreamReadError};
use crate::tools::{MediaDuration, probe_duration};
use log::{debug, error, info, warn};
use std::io::{self, BufReader, Read};
use std::process::{Child, ExitStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const REAP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// 事件出口，關閉後不再送出任何事件
#[derive(Clone)]
pub struct EventGate {
    sender: Arc<Mutex<Option<Sender<ProgressEvent>>>>,
    cancelled: Arc<AtomicBool>,
}

impl EventGate {
    #[must_use]
    pub fn channel() -> (Self, ProgressStream) {
        let (tx, rx) = mpsc::channel();
        let cancelled = Arc::new(AtomicBool::new(false));
        let gate = Self {
            sender: Arc::new(Mutex::new(Some(tx))),
            cancelled: Arc::clone(&cancelled),
        };
        (gate, ProgressStream { rx, cancelled })
    }

    /// 送出事件；已關閉或接收端已丟棄時回傳 false
    pub fn emit(&self, event: ProgressEvent) -> bool {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        guard.as_ref().is_some_and(|tx| tx.send(event).is_ok())
    }

    /// 正常結束：已送出的事件仍可被讀取
    pub fn close(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// 取消：連同尚未讀取的事件一併丟棄
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.close();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

/// 執行緒結束（包含 panic）時一定關閉事件出口
struct CloseOnDrop(EventGate);

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// 進度事件串流：只能消費一次，子程序 stderr 關閉或取消後結束
pub struct ProgressStream {
    rx: Receiver<ProgressEvent>,
    cancelled: Arc<AtomicBool>,
}

impl ProgressStream {
    /// 給 UI 輪詢用，等待最多 `timeout`
    pub fn recv_timeout(&self, timeout: Duration) -> Result<ProgressEvent, RecvTimeoutError> {
        if self.is_cancelled() {
            return Err(RecvTimeoutError::Disconnected);
        }
        let event = self.rx.recv_timeout(timeout)?;
        if self.is_cancelled() {
            return Err(RecvTimeoutError::Disconnected);
        }
        Ok(event)
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Iterator for ProgressStream {
    type Item = ProgressEvent;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_cancelled() {
            return None;
        }
        let event = self.rx.recv().ok()?;
        (!self.is_cancelled()).then_some(event)
    }
}

/// 解析迴圈：讀到 EOF、讀取失敗或出口關閉為止
///
/// 出口關閉後仍會把剩餘輸出讀完丟棄，避免子程序因 pipe 寫滿而卡住。
pub fn monitor_stream<R: Read>(
    reader: R,
    duration: MediaDuration,
    gate: &EventGate,
) -> Result<ProgressState, StreamReadError> {
    if duration.is_zero() {
        warn!("影片長度為 0，無法計算進度比例");
    }

    let mut parser = ProgressParser::new(duration.total_ms);
    let mut tokens = TokenReader::new(BufReader::new(reader));

    while let Some(token) = tokens.next_token()? {
        if gate.is_closed() {
            debug!("事件出口已關閉，停止解析");
            if let Err(e) = io::copy(&mut tokens.into_inner(), &mut io::sink()) {
                debug!("丟棄剩餘輸出時讀取失敗: {e}");
            }
            break;
        }

        if let Some(event) = parser.feed(&token) {
            gate.emit(event);
        }
    }

    Ok(parser.into_state())
}

/// 監看任意輸出串流（不含子程序管理）
pub struct StreamMonitor {
    gate: EventGate,
    worker: JoinHandle<Result<ProgressState, StreamReadError>>,
}

impl StreamMonitor {
    pub fn spawn<R: Read + Send + 'static>(
        reader: R,
        duration: MediaDuration,
    ) -> (Self, ProgressStream) {
        let (gate, stream) = EventGate::channel();
        let worker_gate = gate.clone();
        let worker = thread::spawn(move || {
            let guard = CloseOnDrop(worker_gate);
            monitor_stream(reader, duration, &guard.0)
        });
        (Self { gate, worker }, stream)
    }

    pub fn cancel(&self) {
        self.gate.cancel();
    }

    pub fn join(self) -> Result<ProgressState, EncodeError> {
        let state = self.worker.join().map_err(|_| EncodeError::WorkerPanicked)??;
        Ok(state)
    }
}

/// 編碼結束後的結果
#[derive(Debug, Clone)]
pub struct EncodeSummary {
    pub exit_code: Option<i32>,
    pub success: bool,
    pub cancelled: bool,
    pub final_state: ProgressState,
}

impl EncodeSummary {
    /// stderr 結束前從未出現 speed 標記
    #[must_use]
    pub const fn never_started_encoding(&self) -> bool {
        !self.final_state.is_encoding
    }
}

struct WorkerOutcome {
    state: Result<ProgressState, StreamReadError>,
    status: Option<ExitStatus>,
}

/// 一個執行中的編碼子程序
pub struct EncodeSession {
    pid: u32,
    child: Arc<Mutex<Child>>,
    gate: EventGate,
    cancelled: Arc<AtomicBool>,
    worker: JoinHandle<WorkerOutcome>,
}

impl EncodeSession {
    /// 先取得影片長度，再啟動編碼
    pub fn start(
        request: &EncodeRequest,
        settings: &EncoderSettings,
    ) -> Result<(Self, ProgressStream), EncodeError> {
        let duration = probe_duration(&settings.ffmpeg_binary, &request.input)?;
        Self::start_with_duration(request, settings, duration)
    }

    pub fn start_with_duration(
        request: &EncodeRequest,
        settings: &EncoderSettings,
        duration: MediaDuration,
    ) -> Result<(Self, ProgressStream), EncodeError> {
        let ffmpeg = FfmpegCommand::new(settings, request);
        let launch_error = |source| LaunchError {
            binary: settings.ffmpeg_binary.clone(),
            source,
        };

        let mut child = ffmpeg.build_command().spawn().map_err(launch_error)?;
        let pid = child.id();

        let Some(stderr) = child.stderr.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(launch_error(io::Error::other("stderr 未被擷取")).into());
        };

        info!("啟動編碼 [{pid}]: {}", ffmpeg.command_line());

        let child = Arc::new(Mutex::new(child));
        let (gate, stream) = EventGate::channel();

        let worker_gate = gate.clone();
        let worker_child = Arc::clone(&child);
        let worker = thread::spawn(move || {
            let guard = CloseOnDrop(worker_gate);
            let state = monitor_stream(stderr, duration, &guard.0);
            if let Err(e) = &state {
                error!("編碼輸出讀取失敗 [{pid}]: {e}");
            }
            drop(guard);

            let status = reap(&worker_child, pid);
            WorkerOutcome { state, status }
        });

        let session = Self {
            pid,
            child,
            gate,
            cancelled: Arc::new(AtomicBool::new(false)),
            worker,
        };
        Ok((session, stream))
    }

    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// 停止事件並送出終止訊號，不等待子程序結束
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }

        self.gate.cancel();
        warn!("取消編碼 [{}]", self.pid);

        let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = child.kill() {
            debug!("無法終止程序 [{}]: {e}", self.pid);
        }
    }

    /// 等待解析與子程序結束
    pub fn wait(self) -> Result<EncodeSummary, EncodeError> {
        let outcome = self.worker.join().map_err(|_| EncodeError::WorkerPanicked)?;
        let final_state = outcome.state?;
        let cancelled = self.cancelled.load(Ordering::SeqCst);

        let summary = EncodeSummary {
            exit_code: outcome.status.and_then(|s| s.code()),
            success: outcome.status.is_some_and(|s| s.success()),
            cancelled,
            final_state,
        };

        if summary.success {
            info!("編碼完成 [{}]", self.pid);
        } else if !cancelled {
            warn!("編碼失敗 [{}]: exit code {:?}", self.pid, summary.exit_code);
        }

        Ok(summary)
    }
}

/// 每次輪詢之間釋放鎖，讓 `cancel` 不會被阻塞
fn reap(child: &Mutex<Child>, pid: u32) -> Option<ExitStatus> {
    loop {
        let polled = child
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_wait();

        match polled {
            Ok(Some(status)) => {
                debug!("程序結束 [{pid}]: {status}");
                return Some(status);
            }
            Ok(None) => thread::sleep(REAP_POLL_INTERVAL),
            Err(e) => {
                warn!("無法檢查程序狀態 [{pid}]: {e}");
                return None;
            }
        }
    }
}
