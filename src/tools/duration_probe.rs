use super::time_code::TimeCode;
use crate::error::ProbeError;
use log::{debug, info};
use regex::Regex;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::LazyLock;
use std::thread;

static REGEX_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Duration: (\d{2}):(\d{2}):(\d{2})\.(\d{2})").expect("Invalid regex")
});

/// 影片總長度，一次編碼工作只取得一次
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaDuration {
    pub total_ms: u64,
}

impl MediaDuration {
    #[must_use]
    pub const fn from_millis(total_ms: u64) -> Self {
        Self { total_ms }
    }

    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.total_ms == 0
    }
}

/// 以 `<binary> -i <input>` 讀取 stderr 的檔頭取得影片長度
///
/// 找到第一行 `Duration:` 就立即回傳，不等子程序結束；
/// 子程序交給背景執行緒回收。
pub fn probe_duration(binary: &str, input: &Path) -> Result<MediaDuration, ProbeError> {
    let mut child = Command::new(binary)
        .arg("-i")
        .arg(input)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ProbeError::Launch {
            binary: binary.to_string(),
            source,
        })?;

    let result = match child.stderr.take() {
        Some(stderr) => scan_duration(BufReader::new(stderr)),
        None => Ok(None),
    };

    reap_in_background(child);

    match result {
        Ok(Some(duration)) => {
            info!("影片長度 {} ms: {}", duration.total_ms, input.display());
            Ok(duration)
        }
        Ok(None) => Err(ProbeError::DurationNotFound {
            path: input.to_path_buf(),
        }),
        Err(source) => Err(ProbeError::Read {
            path: input.to_path_buf(),
            source,
        }),
    }
}

/// 逐行掃描，回傳第一個符合的長度；讀到結尾仍找不到則為 `None`
///
/// 檔頭的 metadata 可能不是 UTF-8，每行以 lossy 方式解碼。
pub fn scan_duration<R: BufRead>(mut reader: R) -> io::Result<Option<MediaDuration>> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(None);
        }

        let line = String::from_utf8_lossy(&buf);
        if let Some(caps) = REGEX_DURATION.captures(&line) {
            let total_ms = TimeCode::from_captures(&caps).to_millis();
            return Ok(Some(MediaDuration::from_millis(total_ms)));
        }
    }
}

fn reap_in_background(mut child: Child) {
    thread::spawn(move || {
        // stderr 已關閉，ffmpeg -i 沒有輸出檔會自行結束
        match child.wait() {
            Ok(status) => debug!("長度偵測程序結束: {status}"),
            Err(e) => debug!("無法回收長度偵測程序: {e}"),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const BANNER: &str = "\
Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'input.mp4':
  Metadata:
    major_brand     : isom
  Duration: 01:02:03.04, start: 0.000000, bitrate: 1205 kb/s
  Stream #0:0(und): Video: h264 (High) (avc1 / 0x31637661), yuv420p, 1280x720
At least one output file must be specified
";

    #[test]
    fn test_scan_duration_from_banner() {
        let duration = scan_duration(Cursor::new(BANNER)).unwrap();
        assert_eq!(duration, Some(MediaDuration::from_millis(3_723_040)));
    }

    #[test]
    fn test_scan_duration_returns_first_match() {
        let text = "Duration: 00:00:10.00\nDuration: 00:00:20.00\n";
        let duration = scan_duration(Cursor::new(text)).unwrap();
        assert_eq!(duration.map(|d| d.total_ms), Some(10_000));
    }

    #[test]
    fn test_scan_duration_not_found_is_distinct_from_zero() {
        let missing = scan_duration(Cursor::new("no banner here\n")).unwrap();
        assert_eq!(missing, None);

        let zero = scan_duration(Cursor::new("  Duration: 00:00:00.00, start")).unwrap();
        assert_eq!(zero, Some(MediaDuration::from_millis(0)));
        assert!(zero.unwrap().is_zero());
    }

    #[test]
    fn test_scan_duration_after_non_utf8_metadata() {
        let bytes: &[u8] = b"Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'in.mov':\n  Metadata:\n    title           : caf\xe9\n  Duration: 00:00:10.00, start: 0.000000, bitrate: 1205 kb/s\n";
        let duration = scan_duration(Cursor::new(bytes)).unwrap();
        assert_eq!(duration, Some(MediaDuration::from_millis(10_000)));
    }

    #[test]
    fn test_scan_duration_ignores_na_duration() {
        let text = "  Duration: N/A, start: 0.000000, bitrate: N/A\n";
        assert_eq!(scan_duration(Cursor::new(text)).unwrap(), None);
    }

    #[test]
    fn test_probe_duration_missing_binary() {
        let result = probe_duration("definitely-not-an-encoder-binary", Path::new("in.mp4"));
        assert!(matches!(result, Err(ProbeError::Launch { .. })));
    }
}
