use log::debug;
use regex::Captures;

/// 時:分:秒.百分之一秒
///
/// 只做運算不做範圍檢查，分與秒超過 59 也照樣換算。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeCode {
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
    pub hundredths: u64,
}

impl TimeCode {
    #[must_use]
    pub const fn new(hours: u64, minutes: u64, seconds: u64, hundredths: u64) -> Self {
        Self {
            hours,
            minutes,
            seconds,
            hundredths,
        }
    }

    #[must_use]
    pub const fn to_millis(&self) -> u64 {
        to_milliseconds(self.hours, self.minutes, self.seconds, self.hundredths)
    }

    /// 由 regex 的四個捕獲群組建立
    ///
    /// 任一群組無法解析成整數時整個時間碼視為 0。
    #[must_use]
    pub fn from_captures(caps: &Captures<'_>) -> Self {
        let parse = |index: usize| caps.get(index).and_then(|m| m.as_str().parse::<u64>().ok());

        match (parse(1), parse(2), parse(3), parse(4)) {
            (Some(h), Some(m), Some(s), Some(f)) => Self::new(h, m, s, f),
            _ => {
                debug!("無法解析時間碼: {:?}", caps.get(0).map(|m| m.as_str()));
                Self::default()
            }
        }
    }
}

/// 溢位時停在 `u64::MAX`
#[must_use]
pub const fn to_milliseconds(hours: u64, minutes: u64, seconds: u64, hundredths: u64) -> u64 {
    hours
        .saturating_mul(3_600_000)
        .saturating_add(minutes.saturating_mul(60_000))
        .saturating_add(seconds.saturating_mul(1_000))
        .saturating_add(hundredths.saturating_mul(10))
}

/// 毫秒轉成 HH:MM:SS 顯示用字串
#[must_use]
pub fn format_ms(ms: u64) -> String {
    let secs = ms / 1000;
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    format!("{h:02}:{m:02}:{s:02}")
}
