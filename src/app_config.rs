use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApplicationConfig {
    pub output_directory_base: String,
    pub folder_timestamp_format: String, // strftime format string for the per-session folder
    pub default_container: String, // e.g., "mp4", "mkv"
    pub camera_settings_path: Option<String>,
    pub stop_grace_timeout_secs: f32,
    pub ffmpeg_path: String,
    pub ffplay_path: String,
    pub ffprobe_path: String,
    pub hwaccel: Option<String>, // passed to ffmpeg as -hwaccel, None to omit
    pub preview_fps: u32,
    pub preview_width: u32,
    pub preview_height: u32,
    pub status_interval_secs: u64,
    pub log_level: Option<String>, // Making it optional to potentially use CLI or env var as primary
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        ApplicationConfig {
            output_directory_base: "./data".to_string(),
            folder_timestamp_format: "%Y%m%d_%H%M%S".to_string(),
            default_container: "mp4".to_string(),
            camera_settings_path: None,
            stop_grace_timeout_secs: 5.0,
            ffmpeg_path: "ffmpeg".to_string(),
            ffplay_path: "ffplay".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            hwaccel: Some("auto".to_string()),
            preview_fps: 30,
            preview_width: 640,
            preview_height: 480,
            status_interval_secs: 1,
            log_level: Some("info".to_string()),
        }
    }
}

impl ApplicationConfig {
    pub fn stop_grace_timeout(&self) -> Duration {
        Duration::from_secs_f32(self.stop_grace_timeout_secs)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs.max(1))
    }
}
