use env_logger::Builder;
use log::LevelFilter;
use crate::config_loader::MasterConfig;

/// Log level from `--debug`, then the config's `log_level`, then `info`.
pub fn resolve_log_level(config: Option<&MasterConfig>, debug_flag: bool) -> LevelFilter {
    let log_level_str = if debug_flag {
        "debug".to_string()
    } else {
        config
            .and_then(|c| c.app_settings.log_level.clone())
            .unwrap_or_else(|| "info".to_string()) // Default log level
    };

    match log_level_str.to_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        "off" => LevelFilter::Off,
        s => {
            eprintln!("Unrecognized log level '{}', defaulting to info.", s);
            LevelFilter::Info
        }
    }
}

pub fn initialize_logging(config: Option<&MasterConfig>, cli_matches: &clap::ArgMatches) {
    let mut builder = Builder::new();
    builder.filter_level(resolve_log_level(config, cli_matches.get_flag("debug")));
    // RUST_LOG still refines per-module levels on top of the resolved default.
    if let Ok(spec) = std::env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    }

    builder.try_init().unwrap_or_else(|e| {
        eprintln!("Failed to initialize logger: {}. Logging might not work as expected.", e);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_flag_wins_over_config() {
        let mut config = MasterConfig::default();
        config.app_settings.log_level = Some("warn".to_string());
        assert_eq!(resolve_log_level(Some(&config), true), LevelFilter::Debug);
        assert_eq!(resolve_log_level(Some(&config), false), LevelFilter::Warn);
    }

    #[test]
    fn unknown_or_missing_level_defaults_to_info() {
        let mut config = MasterConfig::default();
        config.app_settings.log_level = Some("chatty".to_string());
        assert_eq!(resolve_log_level(Some(&config), false), LevelFilter::Info);
        assert_eq!(resolve_log_level(None, false), LevelFilter::Info);
    }
}
