//! Installs the process-wide logger. `sonictag-core` only depends on the
//! `log` facade; this binary is what actually prints anything.
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
}
