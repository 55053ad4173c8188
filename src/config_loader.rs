use serde::Deserialize;
use std::fs;
use std::path::Path;
use crate::app_config::ApplicationConfig;
use crate::camera_config::CameraSettings;
use crate::errors::AppError;
use anyhow::{Result, Context, bail};
use log::{debug, info};
use std::time::Instant;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MasterConfig {
    #[serde(rename = "application", default)]
    pub app_settings: ApplicationConfig,
}

pub fn load_config(path: &str) -> Result<MasterConfig> {
    debug!("📄 Attempting to load config from: {}", path);
    let start_time = Instant::now();

    let config_str = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file \'{}\'. 📖", path))?;
    debug!("Read config file in {:?}", start_time.elapsed());

    let parse_start_time = Instant::now();
    let config: MasterConfig = serde_yaml::from_str(&config_str)
        .with_context(|| format!("Failed to parse YAML configuration from \'{}\'. 💔", path))?;
    debug!("Parsed YAML in {:?}", parse_start_time.elapsed());

    validate_master_config(&config).with_context(|| "Master configuration validation failed 👎")?;

    info!("✅ Successfully loaded and validated configuration from \'{}\' in {:?}", path, start_time.elapsed());
    Ok(config)
}

/// Loads the config at `path` if one was given or the default file exists,
/// otherwise falls back to built-in defaults.
pub fn load_config_or_default(path: Option<&str>, default_path: &str) -> Result<MasterConfig> {
    match path {
        Some(p) => load_config(p),
        None if Path::new(default_path).exists() => load_config(default_path),
        None => {
            debug!("No configuration file at '{}', using built-in defaults.", default_path);
            let config = MasterConfig::default();
            validate_master_config(&config)?;
            Ok(config)
        }
    }
}

pub fn validate_master_config(config: &MasterConfig) -> Result<()> {
    debug!("🕵️ Validating master configuration...");
    let app = &config.app_settings;
    if app.output_directory_base.trim().is_empty() {
        bail!("❌ Application output_directory_base cannot be empty.");
    }
    let output_path = Path::new(&app.output_directory_base);
    if output_path.exists() && !output_path.is_dir() {
        bail!("❌ Output directory \'{}\' exists but is not a directory.", app.output_directory_base);
    }
    if app.folder_timestamp_format.trim().is_empty() {
        bail!("❌ Application folder_timestamp_format cannot be empty.");
    }
    if app.default_container.trim().is_empty() {
        bail!("❌ Application default_container cannot be empty.");
    }
    if !app.stop_grace_timeout_secs.is_finite() || app.stop_grace_timeout_secs <= 0.0 {
        bail!(
            "❌ stop_grace_timeout_secs must be a positive number of seconds, got {}.",
            app.stop_grace_timeout_secs
        );
    }
    for (key, value) in [
        ("ffmpeg_path", &app.ffmpeg_path),
        ("ffplay_path", &app.ffplay_path),
        ("ffprobe_path", &app.ffprobe_path),
    ] {
        if value.trim().is_empty() {
            bail!("❌ Application {} cannot be empty.", key);
        }
    }
    if app.preview_fps == 0 || app.preview_width == 0 || app.preview_height == 0 {
        bail!("❌ Preview fps and size must be non-zero.");
    }
    debug!("👍 Master configuration validated.");
    Ok(())
}

/// Reads and parses a camera settings file. The caller keeps its previous
/// settings when this fails.
pub fn load_camera_settings(path: &Path) -> Result<CameraSettings, AppError> {
    debug!("📄 Loading camera settings from: {}", path.display());
    let start_time = Instant::now();
    let content = fs::read_to_string(path).map_err(|e| {
        AppError::SettingsLoad(format!("cannot read '{}': {}", path.display(), e))
    })?;
    let settings = CameraSettings::from_json_str(&content)?;
    info!(
        "✅ Loaded {} camera group(s) from '{}' in {:?}",
        settings.groups().len(),
        path.display(),
        start_time.elapsed()
    );
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_yaml_takes_defaults_for_missing_fields() {
        let yaml = "application:\n  default_container: mkv\n  stop_grace_timeout_secs: 2.5\n";
        let config: MasterConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.app_settings.default_container, "mkv");
        assert_eq!(config.app_settings.stop_grace_timeout_secs, 2.5);
        assert_eq!(config.app_settings.output_directory_base, "./data");
        assert_eq!(config.app_settings.ffmpeg_path, "ffmpeg");
        validate_master_config(&config).unwrap();
    }

    #[test]
    fn rejects_non_positive_grace_timeout() {
        let mut config = MasterConfig::default();
        config.app_settings.stop_grace_timeout_secs = 0.0;
        assert!(validate_master_config(&config).is_err());
    }

    #[test]
    fn missing_default_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");
        let config = load_config_or_default(None, missing.to_str().unwrap()).unwrap();
        assert_eq!(config.app_settings.folder_timestamp_format, "%Y%m%d_%H%M%S");
    }

    #[test]
    fn camera_settings_file_errors_are_settings_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("cameras.json");
        assert!(matches!(load_camera_settings(&missing), Err(AppError::SettingsLoad(_))));

        let mut f = std::fs::File::create(&missing).unwrap();
        writeln!(f, r#"{{"Lobby": [{{"URL": "rtsp://cam1", "Save_name": "lobby_cam"}}]}}"#).unwrap();
        let settings = load_camera_settings(&missing).unwrap();
        assert_eq!(settings.group_names(), vec!["Lobby"]);
    }
}
