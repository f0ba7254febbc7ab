use crate::config::EncoderSettings;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// 一次編碼的輸入、輸出與參數
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub args: Vec<String>,
}

impl EncodeRequest {
    #[must_use]
    pub fn new(input: &Path, output: &Path, args: Vec<String>) -> Self {
        Self {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            args,
        }
    }
}

/// 以輸入檔名加上後綴產生輸出路徑，例如 `clip.mov` -> `clip_x264.mp4`
#[must_use]
pub fn generate_destination_path(source_path: &Path, suffix: &str) -> PathBuf {
    let file_stem = source_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let parent = source_path.parent().unwrap_or(Path::new("."));
    parent.join(format!("{file_stem}{suffix}"))
}

pub struct FfmpegCommand<'a> {
    binary: &'a str,
    global_prefix: &'a [String],
    request: &'a EncodeRequest,
}

impl<'a> FfmpegCommand<'a> {
    #[must_use]
    pub fn new(settings: &'a EncoderSettings, request: &'a EncodeRequest) -> Self {
        Self {
            binary: &settings.ffmpeg_binary,
            global_prefix: &settings.global_prefix,
            request,
        }
    }

    /// `[global-prefix...] -i <input> [user-args...] <output>`
    #[must_use]
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.global_prefix.iter().map(OsString::from).collect();
        args.push(OsString::from("-i"));
        args.push(self.request.input.clone().into_os_string());
        args.extend(self.request.args.iter().map(OsString::from));
        args.push(self.request.output.clone().into_os_string());
        args
    }

    #[must_use]
    pub fn command_line(&self) -> String {
        let args: Vec<String> = self
            .args()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        format!("{} {}", self.binary, args.join(" "))
    }

    /// 只接 stderr，stdin 與 stdout 關閉
    #[must_use]
    pub fn build_command(&self) -> Command {
        let mut cmd = Command::new(self.binary);
        cmd.args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_destination_path() {
        let source = Path::new("/videos/test.mov");
        assert_eq!(
            generate_destination_path(source, "_x264.mp4"),
            Path::new("/videos/test_x264.mp4")
        );
    }

    #[test]
    fn test_generate_destination_path_with_dots() {
        let source = Path::new("/videos/test.video.name.mkv");
        assert_eq!(
            generate_destination_path(source, "_x264.mp4"),
            Path::new("/videos/test.video.name_x264.mp4")
        );
    }

    #[test]
    fn test_argument_order() {
        let settings = EncoderSettings::default();
        let request = EncodeRequest::new(
            Path::new("in.mp4"),
            Path::new("out.mp4"),
            vec!["-c:v".to_string(), "libx265".to_string()],
        );
        let args = FfmpegCommand::new(&settings, &request).args();
        assert_eq!(
            args,
            vec!["-y", "-hide_banner", "-i", "in.mp4", "-c:v", "libx265", "out.mp4"]
                .into_iter()
                .map(OsString::from)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_command_line() {
        let settings = EncoderSettings {
            encoder_args: vec![],
            ..EncoderSettings::default()
        };
        let request = EncodeRequest::new(Path::new("a.mp4"), Path::new("b.mp4"), vec![]);
        assert_eq!(
            FfmpegCommand::new(&settings, &request).command_line(),
            "ffmpeg -y -hide_banner -i a.mp4 b.mp4"
        );
    }
}
