use crate::config::save::save_settings;
use crate::config::types::Config;
use crate::menu::handlers::run_video_encoder;
use anyhow::Result;
use console::{Term, style};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Select};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

pub fn show_main_menu(
    term: &Term,
    shutdown_signal: &Arc<AtomicBool>,
    config: &mut Config,
) -> Result<bool> {
    term.clear_screen()?;

    println!("{}", style("=== 影片編碼工具 ===").cyan().bold());
    println!("{}", style("按 ESC 離開").dim());

    let options = vec!["影片編碼", "編碼設定", "離開"];

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("請選擇功能")
        .items(&options)
        .default(0)
        .interact_on_opt(term)?;

    match selection {
        Some(0) => {
            run_video_encoder(term, shutdown_signal, config)?;
            Ok(true)
        }
        Some(1) => {
            show_encoder_settings_menu(term, config)?;
            Ok(true)
        }
        Some(2) | None => Ok(false),
        _ => unreachable!(),
    }
}

/// 編碼設定選單
fn show_encoder_settings_menu(term: &Term, config: &mut Config) -> Result<()> {
    loop {
        term.clear_screen()?;

        let encoder = &config.settings.encoder;
        println!("{}", style("=== 編碼設定 ===").cyan().bold());
        println!("  ffmpeg:   {}", encoder.ffmpeg_binary);
        println!("  參數:     {}", encoder.encoder_args.join(" "));
        println!("  輸出後綴: {}", encoder.output_suffix);
        println!();

        let options = vec!["ffmpeg 路徑", "編碼參數", "輸出檔名後綴", "返回"];

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("選擇要修改的項目")
            .items(&options)
            .default(0)
            .interact_on_opt(term)?;

        let encoder = &mut config.settings.encoder;
        match selection {
            Some(0) => {
                encoder.ffmpeg_binary = prompt_text("ffmpeg 路徑", &encoder.ffmpeg_binary)?;
            }
            Some(1) => {
                let args = prompt_text("編碼參數", &encoder.encoder_args.join(" "))?;
                encoder.encoder_args = args.split_whitespace().map(ToString::to_string).collect();
            }
            Some(2) => {
                encoder.output_suffix = prompt_text("輸出檔名後綴", &encoder.output_suffix)?;
            }
            Some(3) | None => break,
            _ => unreachable!(),
        }

        save_settings(&config.settings)?;
    }

    Ok(())
}

fn prompt_text(prompt: &str, current: &str) -> Result<String> {
    let value: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(current.to_string())
        .interact_text()?;
    Ok(value.trim().to_string())
}
