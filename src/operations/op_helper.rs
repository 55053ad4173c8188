use crate::camera_config::{CameraGroup, CameraSetting, CameraSettings};
use crate::config_loader::{self, MasterConfig};
use crate::core::capture_engine::FfmpegEngine;
use crate::core::preview::{launch_preview, PreviewOptions};
use crate::core::session_supervisor::{SessionSupervisor, SharedSettings, SupervisorOptions};
use crate::errors::AppError;
use anyhow::{Context, Result};
use clap::ArgMatches;
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// Settings file from `--settings`, falling back to the config's
/// `camera_settings_path`.
pub fn resolve_settings_path(master_config: &MasterConfig, matches: &ArgMatches) -> Option<PathBuf> {
    matches
        .get_one::<String>("settings")
        .cloned()
        .or_else(|| master_config.app_settings.camera_settings_path.clone())
        .map(PathBuf::from)
}

/// Loads the camera settings for this run. Without a settings file the
/// supervisor starts empty (the console can `load` one later).
pub fn load_initial_settings(master_config: &MasterConfig, matches: &ArgMatches) -> Result<CameraSettings> {
    match resolve_settings_path(master_config, matches) {
        Some(path) => config_loader::load_camera_settings(&path)
            .with_context(|| format!("Failed to load camera settings from '{}'", path.display())),
        None => {
            warn!("⚠️ No camera settings file given (use --settings or camera_settings_path).");
            Ok(CameraSettings::default())
        }
    }
}

pub fn build_supervisor(master_config: &MasterConfig, settings: CameraSettings) -> Arc<SessionSupervisor> {
    let init_start = Instant::now();
    let shared: SharedSettings = Arc::new(RwLock::new(settings));
    let engine = Arc::new(FfmpegEngine::from_config(&master_config.app_settings));
    let supervisor = SessionSupervisor::new(shared, engine, SupervisorOptions::from_config(&master_config.app_settings));
    debug!("✅ SessionSupervisor ready in {:?}.", init_start.elapsed());
    Arc::new(supervisor)
}

pub async fn find_group(supervisor: &SessionSupervisor, group_name: &str) -> Result<CameraGroup, AppError> {
    let settings = supervisor.settings();
    let settings = settings.read().await;
    let group = settings.group(group_name).cloned();
    group.ok_or_else(|| AppError::UnknownGroup(group_name.to_string()))
}

pub async fn find_camera(supervisor: &SessionSupervisor, group_name: &str, camera_name: &str) -> Result<CameraSetting, AppError> {
    let group = find_group(supervisor, group_name).await?;
    group.camera(camera_name).cloned().ok_or_else(|| AppError::UnknownCamera {
        group: group_name.to_string(),
        camera: camera_name.to_string(),
    })
}

pub fn describe_settings(settings: &CameraSettings) -> Vec<String> {
    let mut lines = Vec::new();
    for group in settings.groups() {
        lines.push(format!("{} ({} camera(s))", group.group_name, group.members.len()));
        for camera in &group.members {
            lines.push(format!("  {} <- {}", camera.name, camera.source_url));
        }
    }
    lines
}

pub async fn handle_groups_cli(supervisor: &SessionSupervisor) -> Result<()> {
    let settings = supervisor.settings();
    let settings = settings.read().await;
    if settings.is_empty() {
        info!("🤔 No camera groups loaded.");
        return Ok(());
    }
    for line in describe_settings(&settings) {
        println!("{}", line);
    }
    Ok(())
}

pub async fn handle_preview_cli(master_config: &MasterConfig, supervisor: &SessionSupervisor, args: &ArgMatches) -> Result<()> {
    let group_name = args.get_one::<String>("group").context("Missing --group argument for preview command")?;
    let camera_name = args.get_one::<String>("camera").context("Missing --camera argument for preview command")?;
    let camera = find_camera(supervisor, group_name, camera_name).await?;
    launch_preview(&camera, &PreviewOptions::from_config(&master_config.app_settings))?;
    Ok(())
}
