//! 編碼流程的錯誤分類
//!
//! 應用層（選單、設定）使用 anyhow；這裡是引擎對外回報的具體錯誤型別。

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// 無法啟動編碼子程序
#[derive(Debug, Error)]
#[error("無法啟動 {binary}: {source}")]
pub struct LaunchError {
    pub binary: String,
    #[source]
    pub source: io::Error,
}

/// 取得影片總長度失敗
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("無法啟動 {binary} 取得影片長度: {source}")]
    Launch {
        binary: String,
        #[source]
        source: io::Error,
    },

    #[error("讀取 {} 的資訊輸出失敗: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("找不到影片長度資訊: {}", path.display())]
    DurationNotFound { path: PathBuf },
}

/// 編碼進行中讀取 stderr 失敗
#[derive(Debug, Error)]
#[error("讀取編碼器輸出失敗: {source}")]
pub struct StreamReadError {
    #[from]
    pub source: io::Error,
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    StreamRead(#[from] StreamReadError),

    #[error("編碼工作執行緒異常結束")]
    WorkerPanicked,
}
