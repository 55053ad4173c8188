use crate::app_config::ApplicationConfig;
use crate::errors::AppError;
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::{Child, Command};

/// Basic properties of the first video stream of a source.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub codec: Option<String>,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
}

// --- The CaptureEngine Trait ---

/// The external media tool that pulls a network stream into a local file.
///
/// Implementations spawn one process per capture. The returned child must
/// have a piped stdin (the control channel used for graceful quit) and may
/// pipe stderr for diagnostics.
#[async_trait]
pub trait CaptureEngine: Send + Sync {
    fn engine_name(&self) -> String;

    fn spawn_capture(&self, source_url: &str, destination: &Path) -> Result<Child, AppError>;

    /// Bytes written to the process's stdin to ask it to finish the file and exit.
    fn quit_command(&self) -> &[u8] {
        b"q"
    }

    async fn probe_stream(&self, source_url: &str) -> Result<StreamInfo, AppError>;
}

#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg_path: String,
    ffprobe_path: String,
    hwaccel: Option<String>,
}

impl FfmpegEngine {
    pub fn new(ffmpeg_path: impl Into<String>, ffprobe_path: impl Into<String>, hwaccel: Option<String>) -> Self {
        FfmpegEngine {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
            hwaccel,
        }
    }

    pub fn from_config(app_config: &ApplicationConfig) -> Self {
        Self::new(
            app_config.ffmpeg_path.clone(),
            app_config.ffprobe_path.clone(),
            app_config.hwaccel.clone().filter(|h| !h.trim().is_empty()),
        )
    }

    /// Reliable (TCP) transport, wall-clock timestamps so a resumed stream
    /// keeps its timeline, and stream copy into the destination container.
    pub fn capture_args(&self, source_url: &str, destination: &Path) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-rtsp_transport".into(),
            "tcp".into(),
            "-use_wallclock_as_timestamps".into(),
            "1".into(),
        ];
        if let Some(hwaccel) = &self.hwaccel {
            args.push("-hwaccel".into());
            args.push(hwaccel.clone());
        }
        args.extend([
            "-i".to_string(),
            source_url.to_string(),
            "-c:v".to_string(),
            "copy".to_string(),
            "-y".to_string(),
            destination.to_string_lossy().into_owned(),
        ]);
        args
    }

    pub fn probe_args(&self, source_url: &str) -> Vec<String> {
        [
            "-v", "error",
            "-rtsp_transport", "tcp",
            "-select_streams", "v:0",
            "-show_streams",
            "-print_format", "json",
            source_url,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
}

#[async_trait]
impl CaptureEngine for FfmpegEngine {
    fn engine_name(&self) -> String {
        self.ffmpeg_path.clone()
    }

    fn spawn_capture(&self, source_url: &str, destination: &Path) -> Result<Child, AppError> {
        validate_capture_target(source_url, destination)?;
        let args = self.capture_args(source_url, destination);
        debug!("Spawning {} {}", self.ffmpeg_path, args.join(" "));
        Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AppError::EngineSpawn {
                camera: destination.display().to_string(),
                details: format!("failed to launch '{}': {}", self.ffmpeg_path, e),
            })
    }

    async fn probe_stream(&self, source_url: &str) -> Result<StreamInfo, AppError> {
        let output = Command::new(&self.ffprobe_path)
            .args(self.probe_args(source_url))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| AppError::Probe(format!("failed to launch '{}': {}", self.ffprobe_path, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Probe(format!(
                "{} exited with {}: {}",
                self.ffprobe_path,
                output.status,
                stderr.trim()
            )));
        }
        parse_probe_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Rejects targets the engine would only fail on after starting.
pub fn validate_capture_target(source_url: &str, destination: &Path) -> Result<(), AppError> {
    let camera = destination.display().to_string();
    match source_url.split_once("://") {
        Some((scheme, rest))
            if !scheme.is_empty()
                && scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
                && !rest.is_empty() => {}
        _ => {
            return Err(AppError::EngineSpawn {
                camera,
                details: format!("malformed source URL '{}'", source_url),
            })
        }
    }
    match destination.parent() {
        Some(parent) if parent.as_os_str().is_empty() || parent.is_dir() => Ok(()),
        _ => Err(AppError::EngineSpawn {
            camera,
            details: "destination folder does not exist".to_string(),
        }),
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
}

pub fn parse_probe_output(json: &str) -> Result<StreamInfo, AppError> {
    let output: ProbeOutput = serde_json::from_str(json)
        .map_err(|e| AppError::Probe(format!("unreadable ffprobe output: {}", e)))?;
    let stream = output
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Probe("no video stream found".to_string()))?;

    let width = stream.width.ok_or_else(|| AppError::Probe("video stream has no width".to_string()))?;
    let height = stream.height.ok_or_else(|| AppError::Probe("video stream has no height".to_string()))?;
    let frame_rate = stream
        .r_frame_rate
        .as_deref()
        .map(parse_frame_rate)
        .transpose()?
        .unwrap_or(0.0);

    Ok(StreamInfo {
        codec: stream.codec_name,
        width,
        height,
        frame_rate,
    })
}

/// Parses ffprobe's `num/den` rate notation (a bare number is accepted too).
pub fn parse_frame_rate(rate: &str) -> Result<f64, AppError> {
    let bad = || AppError::Probe(format!("invalid frame rate '{}'", rate));
    match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().map_err(|_| bad())?;
            let den: f64 = den.trim().parse().map_err(|_| bad())?;
            if den == 0.0 {
                // ffprobe reports 0/0 for streams with unknown rate.
                Ok(0.0)
            } else {
                Ok(num / den)
            }
        }
        None => rate.trim().parse().map_err(|_| bad()),
    }
}
