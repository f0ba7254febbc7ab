use serde::{Deserialize, Serialize};

/// 最近使用路徑的保留數量
pub const MAX_RECENT_PATHS: usize = 5;

/// 編碼器設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderSettings {
    /// ffmpeg 執行檔名稱或路徑
    pub ffmpeg_binary: String,
    /// 固定放在最前面的參數（覆寫輸出、隱藏 banner）
    pub global_prefix: Vec<String>,
    /// 使用者的編碼參數，位於輸入與輸出之間
    pub encoder_args: Vec<String>,
    /// 自動產生輸出檔名時附加的後綴
    pub output_suffix: String,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            ffmpeg_binary: "ffmpeg".to_string(),
            global_prefix: vec!["-y".to_string(), "-hide_banner".to_string()],
            encoder_args: [
                "-c:v", "libx264", "-preset", "slow", "-crf", "20", "-c:a", "aac", "-b:a", "320k",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            output_suffix: "_x264.mp4".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    pub encoder: EncoderSettings,
    pub recent_paths: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub settings: UserSettings,
}
