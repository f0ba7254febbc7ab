use env_logger::Env;

/// 初始化 logger，預設只顯示 warn 以上，可用 RUST_LOG 覆寫
pub fn init() {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("warn"))
        .format_timestamp_secs()
        .try_init();
}
