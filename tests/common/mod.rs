// Shared helpers for the integration tests: a shell-script capture engine
// and ready-made camera groups.
#![allow(dead_code)]

use async_trait::async_trait;
use rtsp_recorder::camera_config::{CameraGroup, CameraSetting, CameraSettings};
use rtsp_recorder::core::capture_engine::{CaptureEngine, StreamInfo};
use rtsp_recorder::core::session_supervisor::{SessionSupervisor, SupervisorOptions};
use rtsp_recorder::errors::AppError;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::RwLock;

/// Reads one byte (the quit request) and exits 0.
const OBEDIENT: &str = "head -c 1 >/dev/null";
/// Never reads stdin; only a kill ends it.
const HUNG: &str = "exec sleep 30";
/// Complains on stderr and dies on its own.
const CRASHING: &str = "echo 'Connection refused' >&2; exit 1";
/// Finishes by itself without being asked.
const SHORT_LIVED: &str = "exit 0";

/// Behaviour is picked from the source URL host:
/// `rtsp://hung/..`, `rtsp://crash/..`, `rtsp://short/..`, `rtsp://missing/..`
/// (engine binary not found), anything else obeys the quit request.
/// The destination file is created before the process starts.
#[derive(Default)]
pub struct StubEngine {
    pub spawned: AtomicUsize,
}

impl StubEngine {
    pub fn spawn_count(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureEngine for StubEngine {
    fn engine_name(&self) -> String {
        "stub".to_string()
    }

    fn spawn_capture(&self, source_url: &str, destination: &Path) -> Result<Child, AppError> {
        let (program, script) = if source_url.starts_with("rtsp://missing") {
            ("/nonexistent/capture-engine", "")
        } else if source_url.starts_with("rtsp://hung") {
            ("/bin/sh", HUNG)
        } else if source_url.starts_with("rtsp://crash") {
            ("/bin/sh", CRASHING)
        } else if source_url.starts_with("rtsp://short") {
            ("/bin/sh", SHORT_LIVED)
        } else {
            ("/bin/sh", OBEDIENT)
        };

        let child = Command::new(program)
            .arg("-c")
            .arg(script)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AppError::EngineSpawn {
                camera: destination.display().to_string(),
                details: e.to_string(),
            })?;
        std::fs::File::create(destination).map_err(|e| AppError::EngineSpawn {
            camera: destination.display().to_string(),
            details: e.to_string(),
        })?;
        self.spawned.fetch_add(1, Ordering::SeqCst);
        Ok(child)
    }

    async fn probe_stream(&self, _source_url: &str) -> Result<StreamInfo, AppError> {
        Ok(StreamInfo { codec: Some("h264".to_string()), width: 640, height: 480, frame_rate: 25.0 })
    }
}

pub fn camera(name: &str, url: &str) -> CameraSetting {
    CameraSetting {
        name: name.to_string(),
        source_url: url.to_string(),
        output_base_name: name.to_string(),
    }
}

pub fn group(name: &str, members: Vec<CameraSetting>) -> CameraGroup {
    CameraGroup { group_name: name.to_string(), members }
}

pub fn standard_settings() -> CameraSettings {
    CameraSettings::new(vec![
        group("Lobby", vec![camera("lobby_cam", "rtsp://cam1/stream")]),
        group(
            "Yard",
            vec![
                camera("north", "rtsp://cam2/stream"),
                camera("south", "rtsp://cam3/stream"),
                camera("gate", "rtsp://cam4/stream"),
            ],
        ),
        group(
            "Mixed",
            vec![
                camera("first", "rtsp://cam5/stream"),
                camera("second", "rtsp://missing/stream"),
                camera("third", "rtsp://cam6/stream"),
            ],
        ),
        group("Stubborn", vec![camera("frozen", "rtsp://hung/stream"), camera("fine", "rtsp://cam7/stream")]),
        group("Flaky", vec![camera("crasher", "rtsp://crash/stream"), camera("steady", "rtsp://cam8/stream")]),
    ])
}

pub fn options(output_base: &Path, grace_timeout: Duration) -> SupervisorOptions {
    SupervisorOptions {
        output_base: output_base.to_path_buf(),
        folder_timestamp_format: "%Y%m%d_%H%M%S".to_string(),
        grace_timeout,
    }
}

pub fn supervisor(output_base: &Path, grace_timeout: Duration) -> (Arc<SessionSupervisor>, Arc<StubEngine>) {
    let engine = Arc::new(StubEngine::default());
    let supervisor = SessionSupervisor::new(
        Arc::new(RwLock::new(standard_settings())),
        engine.clone(),
        options(output_base, grace_timeout),
    );
    (Arc::new(supervisor), engine)
}

pub fn data_dir(tmp: &tempfile::TempDir) -> PathBuf {
    tmp.path().join("data")
}
