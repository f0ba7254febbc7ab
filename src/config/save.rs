use crate::config::load::SETTINGS_FILE;
use crate::config::types::{MAX_RECENT_PATHS, UserSettings};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

pub fn save_settings(settings: &UserSettings) -> Result<()> {
    save_settings_to(settings, Path::new(SETTINGS_FILE))
}

pub fn save_settings_to(settings: &UserSettings, path: &Path) -> Result<()> {
    let content = serde_json::to_string_pretty(settings).context("Failed to serialize settings")?;

    fs::write(path, content)
        .with_context(|| format!("Failed to write settings to {}", path.display()))?;

    Ok(())
}

/// 更新最近使用的路徑
/// 將新路徑加入最前面，去重並限制數量
pub fn add_recent_path(settings: &mut UserSettings, path: &str) {
    settings.recent_paths.retain(|p| p != path);
    settings.recent_paths.insert(0, path.to_string());
    settings.recent_paths.truncate(MAX_RECENT_PATHS);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::Config;

    #[test]
    fn test_add_recent_path_dedup_and_order() {
        let mut settings = UserSettings::default();
        add_recent_path(&mut settings, "/a.mp4");
        add_recent_path(&mut settings, "/b.mp4");
        add_recent_path(&mut settings, "/a.mp4");
        assert_eq!(settings.recent_paths, vec!["/a.mp4", "/b.mp4"]);
    }

    #[test]
    fn test_add_recent_path_truncates() {
        let mut settings = UserSettings::default();
        for i in 0..(MAX_RECENT_PATHS + 3) {
            add_recent_path(&mut settings, &format!("/{i}.mp4"));
        }
        assert_eq!(settings.recent_paths.len(), MAX_RECENT_PATHS);
        assert_eq!(
            settings.recent_paths[0],
            format!("/{}.mp4", MAX_RECENT_PATHS + 2)
        );
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        let mut settings = UserSettings::default();
        settings.encoder.ffmpeg_binary = "ffmpeg7".to_string();
        add_recent_path(&mut settings, "/videos/a.mkv");

        save_settings_to(&settings, &path).unwrap();
        let loaded = Config::load_settings(&path).unwrap();
        assert_eq!(loaded, settings);
    }
}
