use crate::tools::TimeCode;
use log::{debug, info, warn};
use regex::Regex;
use std::sync::{Arc, LazyLock};

static REGEX_ENCODING_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"time=(\d{2}):(\d{2}):(\d{2})\.(\d{2})").expect("Invalid regex")
});

static REGEX_ENCODING_SPEED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"speed=\d+\.\d+x").expect("Invalid regex"));

/// 每個 frame 統計區塊的開頭標記
const FRAME_STAT_MARKER: &str = "frame=";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEventKind {
    /// `time=` 更新了已編碼時間
    Tick,
    /// 第一次出現 `speed=`，進入正式編碼階段
    PhaseTransition,
    /// 新的 frame 統計區塊寫入 log
    LogFlush,
}

/// 某個時間點的進度快照
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub sequence: u64,
    pub kind: ProgressEventKind,
    pub elapsed_ms: u64,
    pub total_ms: u64,
    /// 總長度為 0 時無法計算，為 `None`；不做上限截斷
    pub fraction: Option<f64>,
    pub is_encoding: bool,
    pub log: Arc<String>,
    pub latest_block: Option<String>,
}

impl ProgressEvent {
    /// 截斷到 [0, 1]，僅供畫面顯示
    #[must_use]
    pub fn display_fraction(&self) -> f64 {
        self.fraction.map_or(0.0, |f| f.clamp(0.0, 1.0))
    }
}

/// 單一編碼工作的可變狀態，只由解析迴圈寫入
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressState {
    pub elapsed_ms: u64,
    pub total_ms: u64,
    pub fraction: Option<f64>,
    pub log_blocks: Vec<String>,
    pub is_encoding: bool,
}

impl ProgressState {
    #[must_use]
    pub fn new(total_ms: u64) -> Self {
        Self {
            total_ms,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn log_text(&self) -> String {
        self.log_blocks.concat()
    }
}

/// stderr token 的狀態機
pub struct ProgressParser {
    state: ProgressState,
    log: Arc<String>,
    pending: Vec<String>,
    pending_has_stats: bool,
    sequence: u64,
    overshoot_reported: bool,
}

impl ProgressParser {
    #[must_use]
    pub fn new(total_ms: u64) -> Self {
        Self {
            state: ProgressState::new(total_ms),
            log: Arc::new(String::new()),
            pending: Vec::new(),
            pending_has_stats: false,
            sequence: 0,
            overshoot_reported: false,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &ProgressState {
        &self.state
    }

    #[must_use]
    pub fn into_state(self) -> ProgressState {
        self.state
    }

    /// 處理一個 token，有新資訊時回傳事件
    pub fn feed(&mut self, token: &str) -> Option<ProgressEvent> {
        let is_marker = REGEX_ENCODING_SPEED.is_match(token);

        if self.state.is_encoding {
            self.pending.push(token.to_string());
            if !is_marker {
                self.pending_has_stats = true;
            }
        }

        if let Some(caps) = REGEX_ENCODING_TIME.captures(token) {
            self.update_elapsed(TimeCode::from_captures(&caps).to_millis());
            return Some(self.snapshot(ProgressEventKind::Tick, None));
        }

        if is_marker {
            return self.handle_speed_marker();
        }

        None
    }

    fn update_elapsed(&mut self, elapsed_ms: u64) {
        self.state.elapsed_ms = elapsed_ms;
        self.state.fraction = match self.state.total_ms {
            0 => None,
            total => Some(elapsed_ms as f64 / total as f64),
        };

        if let Some(fraction) = self.state.fraction {
            if fraction > 1.0 && !self.overshoot_reported {
                self.overshoot_reported = true;
                warn!(
                    "已編碼時間超過影片長度: {} / {} ms",
                    elapsed_ms, self.state.total_ms
                );
            }
        }
    }

    fn handle_speed_marker(&mut self) -> Option<ProgressEvent> {
        if !self.state.is_encoding {
            self.state.is_encoding = true;
            let block = self.flush_pending();
            info!("進入編碼階段");
            return Some(self.snapshot(ProgressEventKind::PhaseTransition, block));
        }

        if !self.pending_has_stats {
            debug!("連續的 speed 標記，略過");
            return None;
        }

        let block = self.flush_pending();
        Some(self.snapshot(ProgressEventKind::LogFlush, block))
    }

    /// 把累積的 token 組成一個 log 區塊
    fn flush_pending(&mut self) -> Option<String> {
        let joined = self.pending.join(" ");
        self.pending.clear();
        self.pending_has_stats = false;

        if joined.is_empty() {
            return None;
        }

        let block = normalize_log_block(&joined);
        Arc::make_mut(&mut self.log).push_str(&block);
        self.state.log_blocks.push(block.clone());
        Some(block)
    }

    fn snapshot(&mut self, kind: ProgressEventKind, latest_block: Option<String>) -> ProgressEvent {
        self.sequence += 1;
        ProgressEvent {
            sequence: self.sequence,
            kind,
            elapsed_ms: self.state.elapsed_ms,
            total_ms: self.state.total_ms,
            fraction: self.state.fraction,
            is_encoding: self.state.is_encoding,
            log: Arc::clone(&self.log),
            latest_block,
        }
    }
}

/// 每個 `frame=` 前換行，並把 `key= value` 收成 `key=value`
#[must_use]
pub fn normalize_log_block(raw: &str) -> String {
    raw.replace(FRAME_STAT_MARKER, &format!("\n{FRAME_STAT_MARKER}"))
        .replace("= ", "=")
}
