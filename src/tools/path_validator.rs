use anyhow::{Result, bail};
use std::path::Path;

/// 編碼前檢查輸入與輸出路徑
pub fn validate_encode_paths(input: &Path, output: &Path) -> Result<()> {
    if input.as_os_str().is_empty() || output.as_os_str().is_empty() {
        bail!("輸入與輸出路徑不可為空");
    }
    if input == output {
        bail!("輸出路徑不可與輸入相同: {}", input.display());
    }
    validate_file_exists(input)
}

pub fn validate_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("路徑不存在: {}", path.display());
    }
    if !path.is_file() {
        bail!("路徑不是檔案: {}", path.display());
    }
    Ok(())
}

pub fn ensure_parent_directory_exists(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
