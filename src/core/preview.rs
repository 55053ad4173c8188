use crate::app_config::ApplicationConfig;
use crate::camera_config::CameraSetting;
use crate::errors::AppError;
use log::{debug, info};
use std::process::{Command, Stdio};

#[derive(Debug, Clone)]
pub struct PreviewOptions {
    pub ffplay_path: String,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
}

impl PreviewOptions {
    pub fn from_config(app_config: &ApplicationConfig) -> Self {
        PreviewOptions {
            ffplay_path: app_config.ffplay_path.clone(),
            fps: app_config.preview_fps,
            width: app_config.preview_width,
            height: app_config.preview_height,
        }
    }
}

/// Decode-and-display arguments: TCP transport, no audio, fixed rate and size.
pub fn preview_args(source_url: &str, options: &PreviewOptions) -> Vec<String> {
    vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-rtsp_transport".to_string(),
        "tcp".to_string(),
        "-i".to_string(),
        source_url.to_string(),
        "-an".to_string(),
        "-vf".to_string(),
        format!("fps={},scale={}:{}", options.fps, options.width, options.height),
        "-window_title".to_string(),
        source_url.to_string(),
    ]
}

/// Opens a preview window for `camera`. The player is not tracked: it lives
/// until the user closes it, independent of any recording session.
pub fn launch_preview(camera: &CameraSetting, options: &PreviewOptions) -> Result<u32, AppError> {
    let args = preview_args(&camera.source_url, options);
    debug!("Spawning {} {}", options.ffplay_path, args.join(" "));
    let child = Command::new(&options.ffplay_path)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| AppError::EngineSpawn {
            camera: camera.name.clone(),
            details: format!("failed to launch preview '{}': {}", options.ffplay_path, e),
        })?;
    let pid = child.id();
    info!("👀 Preview for '{}' opened (pid {}).", camera.name, pid);
    Ok(pid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_is_capped_and_silent() {
        let options = PreviewOptions {
            ffplay_path: "ffplay".to_string(),
            fps: 30,
            width: 640,
            height: 480,
        };
        let args = preview_args("rtsp://cam1", &options);
        assert!(args.contains(&"-an".to_string()));
        let vf = args.iter().position(|a| a == "-vf").unwrap();
        assert_eq!(args[vf + 1], "fps=30,scale=640:480");
        let transport = args.iter().position(|a| a == "-rtsp_transport").unwrap();
        assert_eq!(args[transport + 1], "tcp");
    }

    #[test]
    fn missing_player_is_a_spawn_error() {
        let camera = CameraSetting {
            name: "lobby_cam".to_string(),
            source_url: "rtsp://cam1".to_string(),
            output_base_name: "lobby_cam".to_string(),
        };
        let options = PreviewOptions {
            ffplay_path: "/nonexistent/ffplay-binary".to_string(),
            fps: 30,
            width: 640,
            height: 480,
        };
        assert!(matches!(launch_preview(&camera, &options), Err(AppError::EngineSpawn { .. })));
    }
}
