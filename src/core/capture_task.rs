use crate::camera_config::CameraSetting;
use crate::core::capture_engine::CaptureEngine;
use crate::errors::AppError;
use log::{debug, error, info, warn};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Running,
    Stopping,
    Stopped,
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Stopped | TaskState::Failed)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Idle => "idle",
            TaskState::Running => "recording",
            TaskState::Stopping => "stopping",
            TaskState::Stopped => "stopped",
            TaskState::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskFailure {
    /// The engine could not be launched for this camera.
    Spawn(AppError),
    /// The engine exited while it was supposed to be recording.
    UnexpectedExit(String),
    /// The engine ignored the quit request and was killed after the grace timeout.
    ForcedKill(AppError),
    /// Waiting on or killing the process failed.
    Wait(String),
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskFailure::Spawn(e) => write!(f, "{}", e),
            TaskFailure::UnexpectedExit(status) => write!(f, "engine exited unexpectedly ({})", status),
            TaskFailure::ForcedKill(e) => write!(f, "{}", e),
            TaskFailure::Wait(details) => write!(f, "could not reap engine process: {}", details),
        }
    }
}

/// Final view of one task, as it appears in a session report.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSummary {
    pub id: usize,
    pub camera_name: String,
    pub destination_path: PathBuf,
    pub state: TaskState,
    pub forced_kill: bool,
    pub exit_code: Option<i32>,
    pub failure: Option<String>,
    pub last_diagnostic: Option<String>,
}

/// One capture engine invocation for one camera.
pub struct CaptureTask {
    id: usize,
    camera_name: String,
    source_url: String,
    destination_path: PathBuf,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    quit_command: Vec<u8>,
    state: TaskState,
    failure: Option<TaskFailure>,
    forced_kill: bool,
    exit_status: Option<ExitStatus>,
    last_diagnostic: Arc<Mutex<Option<String>>>,
}

impl CaptureTask {
    /// Launches the engine for `camera`. Never fails: a spawn error leaves
    /// the task in `Failed` with the error recorded.
    pub fn start(id: usize, camera: &CameraSetting, destination_path: &Path, engine: &dyn CaptureEngine) -> Self {
        let mut task = CaptureTask {
            id,
            camera_name: camera.name.clone(),
            source_url: camera.source_url.clone(),
            destination_path: destination_path.to_path_buf(),
            child: None,
            stdin: None,
            quit_command: engine.quit_command().to_vec(),
            state: TaskState::Idle,
            failure: None,
            forced_kill: false,
            exit_status: None,
            last_diagnostic: Arc::new(Mutex::new(None)),
        };

        let spawn_start = Instant::now();
        match engine.spawn_capture(&task.source_url, &task.destination_path) {
            Ok(mut child) => {
                task.stdin = child.stdin.take();
                if task.stdin.is_none() {
                    warn!("⚠️ [{}] Engine process has no control channel; stop will rely on the grace timeout.", task.camera_name);
                }
                if let Some(stderr) = child.stderr.take() {
                    let camera_name = task.camera_name.clone();
                    let last_diagnostic = Arc::clone(&task.last_diagnostic);
                    tokio::spawn(async move {
                        let mut lines = BufReader::new(stderr).lines();
                        while let Ok(Some(line)) = lines.next_line().await {
                            let line = line.trim();
                            if line.is_empty() {
                                continue;
                            }
                            warn!("📢 [{}] engine: {}", camera_name, line);
                            if let Ok(mut slot) = last_diagnostic.lock() {
                                *slot = Some(line.to_string());
                            }
                        }
                    });
                }
                info!(
                    "🎬 [{}] Recording {} -> {} with {} (pid {:?}, spawned in {:?})",
                    task.camera_name,
                    task.source_url,
                    task.destination_path.display(),
                    engine.engine_name(),
                    child.id(),
                    spawn_start.elapsed()
                );
                task.child = Some(child);
                task.state = TaskState::Running;
            }
            Err(e) => {
                let err = match e {
                    AppError::EngineSpawn { details, .. } => AppError::EngineSpawn {
                        camera: task.camera_name.clone(),
                        details,
                    },
                    other => AppError::EngineSpawn {
                        camera: task.camera_name.clone(),
                        details: other.to_string(),
                    },
                };
                error!("❌ {}", err);
                task.failure = Some(TaskFailure::Spawn(err));
                task.state = TaskState::Failed;
            }
        }
        task
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn camera_name(&self) -> &str {
        &self.camera_name
    }

    pub fn destination_path(&self) -> &Path {
        &self.destination_path
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn failure(&self) -> Option<&TaskFailure> {
        self.failure.as_ref()
    }

    pub fn forced_kill(&self) -> bool {
        self.forced_kill
    }

    pub fn last_diagnostic(&self) -> Option<String> {
        self.last_diagnostic.lock().ok().and_then(|slot| slot.clone())
    }

    /// Non-blocking check for an engine that exited on its own.
    pub fn refresh(&mut self) -> TaskState {
        if self.state != TaskState::Running {
            return self.state;
        }
        let polled = self.child.as_mut().map(|child| child.try_wait());
        match polled {
            Some(Ok(Some(status))) => self.mark_unexpected_exit(status),
            Some(Ok(None)) | None => {}
            Some(Err(e)) => debug!("[{}] try_wait failed: {}", self.camera_name, e),
        }
        self.state
    }

    /// Asks the engine to quit, closes its control channel, and waits up to
    /// `grace_timeout` for it to exit before killing it. No-op unless `Running`.
    pub async fn stop(&mut self, grace_timeout: Duration) {
        if self.refresh() != TaskState::Running {
            debug!("[{}] stop() ignored in state {}", self.camera_name, self.state);
            return;
        }
        let Some(mut child) = self.child.take() else {
            self.state = TaskState::Stopped;
            return;
        };
        self.state = TaskState::Stopping;
        let stop_start = Instant::now();
        debug!("🛑 [{}] Sending quit request to engine.", self.camera_name);

        let stdin = self.stdin.take();
        let quit_command = self.quit_command.clone();
        let camera_name = self.camera_name.clone();
        let graceful = async {
            if let Some(mut stdin) = stdin {
                // A closed pipe just means the engine is already on its way out.
                if let Err(e) = stdin.write_all(&quit_command).await {
                    debug!("[{}] Could not write quit request: {}", camera_name, e);
                }
                let _ = stdin.flush().await;
                drop(stdin);
            }
            child.wait().await
        };

        match tokio::time::timeout(grace_timeout, graceful).await {
            Ok(Ok(status)) => {
                self.exit_status = Some(status);
                self.state = TaskState::Stopped;
                info!(
                    "✅ [{}] Engine exited ({}) in {:?}. File: {}",
                    self.camera_name,
                    status,
                    stop_start.elapsed(),
                    self.destination_path.display()
                );
            }
            Ok(Err(e)) => {
                error!("❌ [{}] Failed waiting for engine exit: {}", self.camera_name, e);
                self.failure = Some(TaskFailure::Wait(e.to_string()));
                self.state = TaskState::Failed;
            }
            Err(_) => {
                let err = AppError::GracefulStopTimeout {
                    camera: self.camera_name.clone(),
                    timeout_secs: grace_timeout.as_secs_f64(),
                };
                warn!("⏱️ [{}] No exit after {:?}; killing engine process.", self.camera_name, grace_timeout);
                if let Err(e) = child.kill().await {
                    error!("❌ [{}] Kill failed: {}", self.camera_name, e);
                }
                self.exit_status = child.try_wait().ok().flatten();
                self.forced_kill = true;
                self.failure = Some(TaskFailure::ForcedKill(err));
                self.state = TaskState::Failed;
            }
        }
    }

    /// Waits for the engine to exit on its own, without signalling it.
    pub async fn wait(&mut self) -> Option<ExitStatus> {
        if self.state != TaskState::Running {
            return self.exit_status;
        }
        let child = self.child.as_mut()?;
        let waited = child.wait().await;
        match waited {
            Ok(status) => {
                self.child = None;
                self.stdin = None;
                if status.success() {
                    self.exit_status = Some(status);
                    self.state = TaskState::Stopped;
                } else {
                    self.mark_unexpected_exit(status);
                }
            }
            Err(e) => {
                self.failure = Some(TaskFailure::Wait(e.to_string()));
                self.state = TaskState::Failed;
            }
        }
        self.exit_status
    }

    pub fn summary(&self) -> TaskSummary {
        TaskSummary {
            id: self.id,
            camera_name: self.camera_name.clone(),
            destination_path: self.destination_path.clone(),
            state: self.state,
            forced_kill: self.forced_kill,
            exit_code: self.exit_status.and_then(|s| s.code()),
            failure: self.failure.as_ref().map(|f| f.to_string()),
            last_diagnostic: self.last_diagnostic(),
        }
    }

    fn mark_unexpected_exit(&mut self, status: ExitStatus) {
        let details = match self.last_diagnostic() {
            Some(line) => format!("{}; last engine message: {}", status, line),
            None => status.to_string(),
        };
        warn!("⚠️ [{}] Engine exited while recording: {}", self.camera_name, details);
        self.exit_status = Some(status);
        self.child = None;
        self.stdin = None;
        self.failure = Some(TaskFailure::UnexpectedExit(details));
        self.state = TaskState::Failed;
    }
}

impl fmt::Debug for CaptureTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureTask")
            .field("id", &self.id)
            .field("camera_name", &self.camera_name)
            .field("destination_path", &self.destination_path)
            .field("state", &self.state)
            .field("forced_kill", &self.forced_kill)
            .finish()
    }
}
