use crate::app_config::ApplicationConfig;
use crate::camera_config::CameraSettings;
use crate::common::file_utils;
use crate::config_loader;
use crate::common::timestamp_utils::{current_local_timestamp_str, format_elapsed};
use crate::core::capture_engine::CaptureEngine;
use crate::core::capture_task::TaskSummary;
use crate::core::recording_session::{RecordingSession, SessionHandle, SessionReport};
use crate::errors::AppError;
use log::{debug, error, info, warn};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch, Mutex, RwLock};

pub type SharedSettings = Arc<RwLock<CameraSettings>>;

#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    pub output_base: PathBuf,
    pub folder_timestamp_format: String,
    pub grace_timeout: Duration,
}

impl SupervisorOptions {
    pub fn from_config(app_config: &ApplicationConfig) -> Self {
        SupervisorOptions {
            output_base: PathBuf::from(&app_config.output_directory_base),
            folder_timestamp_format: app_config.folder_timestamp_format.clone(),
            grace_timeout: app_config.stop_grace_timeout(),
        }
    }
}

/// Status lines pushed to the front end.
#[derive(Debug, Clone)]
pub enum StatusEvent {
    SessionStarted {
        session_id: u64,
        group_name: String,
        output_folder: PathBuf,
        running: usize,
        failed: usize,
    },
    CameraFailed {
        camera_name: String,
        details: String,
    },
    SessionStopped(SessionReport),
    Message(String),
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusEvent::SessionStarted { group_name, output_folder, running, failed, .. } => {
                write!(
                    f,
                    "Recording {} started, saving in {} ({} camera(s) recording",
                    group_name,
                    output_folder.display(),
                    running
                )?;
                if *failed > 0 {
                    write!(f, ", {} failed", failed)?;
                }
                write!(f, ")")
            }
            StatusEvent::CameraFailed { camera_name, details } => write!(f, "Camera {} failed: {}", camera_name, details),
            StatusEvent::SessionStopped(report) => write!(f, "{}", report.to_string().trim_end()),
            StatusEvent::Message(message) => f.write_str(message),
        }
    }
}

enum Slot {
    Idle,
    Active(RecordingSession),
    Stopping { group_name: String },
}

/// Outcome of the most recent stop, observed by `shutdown`.
#[derive(Debug, Clone)]
enum StopProgress {
    NotStarted,
    InFlight,
    Finished(Option<SessionReport>),
}

/// Owns the single recording-session slot.
///
/// Idle -> Active on `start`, Active -> Stopping -> Idle once every task has
/// been reaped. The slot lock is held for the transition only, never while
/// the engines are being waited on. The Stopping -> Idle step belongs to the
/// stop task itself, so it happens even if the caller of `stop` goes away.
pub struct SessionSupervisor {
    settings: SharedSettings,
    engine: Arc<dyn CaptureEngine>,
    options: SupervisorOptions,
    slot: Arc<Mutex<Slot>>,
    next_session_id: AtomicU64,
    events: broadcast::Sender<StatusEvent>,
    stop_progress: Arc<watch::Sender<StopProgress>>,
}

impl SessionSupervisor {
    pub fn new(settings: SharedSettings, engine: Arc<dyn CaptureEngine>, options: SupervisorOptions) -> Self {
        debug!("🛠️ Initializing SessionSupervisor (output base: {})", options.output_base.display());
        let (events, _) = broadcast::channel(64);
        let (stop_progress, _) = watch::channel(StopProgress::NotStarted);
        SessionSupervisor {
            settings,
            engine,
            options,
            slot: Arc::new(Mutex::new(Slot::Idle)),
            next_session_id: AtomicU64::new(1),
            events,
            stop_progress: Arc::new(stop_progress),
        }
    }

    pub fn settings(&self) -> SharedSettings {
        Arc::clone(&self.settings)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.events.subscribe()
    }

    /// Swaps in a freshly loaded settings set. Running sessions keep the
    /// camera list they were started with.
    pub async fn replace_settings(&self, settings: CameraSettings) {
        let groups = settings.groups().len();
        *self.settings.write().await = settings;
        self.emit(StatusEvent::Message(format!("Loaded {} camera group(s)", groups)));
    }

    /// Loads a settings file and swaps it in. On failure the current groups
    /// stay untouched.
    pub async fn reload_settings(&self, path: &Path) -> Result<usize, AppError> {
        let settings = config_loader::load_camera_settings(path)?;
        let groups = settings.groups().len();
        self.replace_settings(settings).await;
        Ok(groups)
    }

    /// Starts recording `group_name` into `<output_base>/<local timestamp>`.
    pub async fn start(&self, group_name: &str, container: &str) -> Result<SessionHandle, AppError> {
        let timestamp = current_local_timestamp_str(&self.options.folder_timestamp_format);
        self.start_with_timestamp(group_name, container, &timestamp).await
    }

    /// `start` with a caller-provided folder timestamp.
    pub async fn start_with_timestamp(
        &self,
        group_name: &str,
        container: &str,
        timestamp: &str,
    ) -> Result<SessionHandle, AppError> {
        let start_time = Instant::now();
        let mut slot = self.slot.lock().await;
        match &*slot {
            Slot::Active(session) => return Err(AppError::AlreadyActive(session.group_name().to_string())),
            Slot::Stopping { group_name } => return Err(AppError::AlreadyActive(group_name.clone())),
            Slot::Idle => {}
        }

        let container = validate_container(container)?;
        let group = self
            .settings
            .read()
            .await
            .group(group_name)
            .cloned()
            .ok_or_else(|| AppError::UnknownGroup(group_name.to_string()))?;

        let output_folder = file_utils::unique_session_folder(&self.options.output_base, timestamp);
        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let session = RecordingSession::begin(session_id, &group, &output_folder, &container, self.engine.as_ref())?;
        let handle = session.handle();
        *slot = Slot::Active(session);
        drop(slot);

        debug!("Session #{} start transition took {:?}", session_id, start_time.elapsed());
        self.emit(StatusEvent::SessionStarted {
            session_id,
            group_name: handle.group_name.clone(),
            output_folder: handle.output_folder.clone(),
            running: handle.running_count(),
            failed: handle.failed().count(),
        });
        for task in handle.failed() {
            self.emit(StatusEvent::CameraFailed {
                camera_name: task.camera_name.clone(),
                details: task.failure.clone().unwrap_or_default(),
            });
        }
        Ok(handle)
    }

    /// Stops the active session and returns its report.
    ///
    /// The engines are waited on in a separate tokio task that also returns
    /// the slot to Idle, so the caller only awaits the outcome and may drop
    /// this future without wedging the supervisor.
    pub async fn stop(&self) -> Result<SessionReport, AppError> {
        let session = {
            let mut slot = self.slot.lock().await;
            match std::mem::replace(&mut *slot, Slot::Idle) {
                Slot::Active(session) => {
                    *slot = Slot::Stopping { group_name: session.group_name().to_string() };
                    self.stop_progress.send_replace(StopProgress::InFlight);
                    session
                }
                other => {
                    *slot = other;
                    return Err(AppError::NoActiveSession);
                }
            }
        };

        let session_id = session.session_id();
        let grace_timeout = self.options.grace_timeout;
        self.emit(StatusEvent::Message(format!("Stopping recording {}...", session.group_name())));

        let slot = Arc::clone(&self.slot);
        let stop_progress = Arc::clone(&self.stop_progress);
        let events = self.events.clone();
        let finisher = tokio::spawn(async move {
            let outcome = tokio::spawn(session.end_all(grace_timeout)).await;
            let mut slot = slot.lock().await;
            *slot = Slot::Idle;
            match outcome {
                Ok(report) => {
                    for task in report.tasks.iter().filter(|t| t.forced_kill) {
                        warn!("⚠️ Camera '{}' needed a forced kill.", task.camera_name);
                    }
                    stop_progress.send_replace(StopProgress::Finished(Some(report.clone())));
                    publish(&events, StatusEvent::SessionStopped(report.clone()));
                    Ok(report)
                }
                Err(join_err) => {
                    // The session (and with it every child, via kill_on_drop) is gone.
                    error!("💀 Stop task for session #{} failed: {}", session_id, join_err);
                    stop_progress.send_replace(StopProgress::Finished(None));
                    let err = AppError::Task(format!("stopping session #{} failed: {}", session_id, join_err));
                    publish(&events, StatusEvent::Message(err.to_string()));
                    Err(err)
                }
            }
        });

        match finisher.await {
            Ok(result) => result,
            Err(join_err) => Err(AppError::Task(format!("stopping session #{} failed: {}", session_id, join_err))),
        }
    }

    /// Stops whatever is recording; used on quit and Ctrl-C. A stop already
    /// in progress is waited for, and its report returned.
    pub async fn shutdown(&self) -> Option<SessionReport> {
        match self.stop().await {
            Ok(report) => Some(report),
            Err(AppError::NoActiveSession) => self.wait_for_pending_stop().await,
            Err(e) => {
                error!("❌ Shutdown stop failed: {}", e);
                None
            }
        }
    }

    async fn wait_for_pending_stop(&self) -> Option<SessionReport> {
        let mut progress = {
            let slot = self.slot.lock().await;
            if !matches!(&*slot, Slot::Stopping { .. }) {
                return None;
            }
            // Subscribed under the slot lock: the stop task cannot finish in between.
            self.stop_progress.subscribe()
        };
        let wait_start = Instant::now();
        info!("⏳ Waiting for the stop in progress to finish...");
        let finished = progress.wait_for(|p| !matches!(p, StopProgress::InFlight)).await;
        let report = match finished {
            Ok(progress) => match &*progress {
                StopProgress::Finished(report) => report.clone(),
                _ => None,
            },
            Err(e) => {
                error!("❌ Lost track of the stop in progress: {}", e);
                None
            }
        };
        debug!("Pending stop settled after {:?}", wait_start.elapsed());
        report
    }

    pub async fn is_active(&self) -> bool {
        !matches!(&*self.slot.lock().await, Slot::Idle)
    }

    pub async fn active_handle(&self) -> Option<SessionHandle> {
        match &*self.slot.lock().await {
            Slot::Active(session) => Some(session.handle()),
            _ => None,
        }
    }

    /// Reaps engines that exited on their own and reports each newly failed
    /// camera as a status event.
    pub async fn poll(&self) -> Vec<TaskSummary> {
        let newly_failed = match &mut *self.slot.lock().await {
            Slot::Active(session) => session.refresh(),
            _ => Vec::new(),
        };
        for task in &newly_failed {
            self.emit(StatusEvent::CameraFailed {
                camera_name: task.camera_name.clone(),
                details: task.failure.clone().unwrap_or_default(),
            });
        }
        newly_failed
    }

    /// Human-readable state: idle, stopping, or group, elapsed time and
    /// per-camera states.
    pub async fn status_text(&self) -> String {
        match &*self.slot.lock().await {
            Slot::Idle => "Idle".to_string(),
            Slot::Stopping { group_name } => format!("Stopping recording {}...", group_name),
            Slot::Active(session) => {
                let mut text = format!(
                    "Recording {} for {} in {}",
                    session.group_name(),
                    format_elapsed(session.elapsed()),
                    session.output_folder().display()
                );
                for line in session.status_lines() {
                    text.push_str("\n  ");
                    text.push_str(&line);
                }
                text
            }
        }
    }

    fn emit(&self, event: StatusEvent) {
        publish(&self.events, event);
    }
}

fn publish(events: &broadcast::Sender<StatusEvent>, event: StatusEvent) {
    info!("📣 {}", event);
    // No subscribers is fine.
    let _ = events.send(event);
}

/// Container names become file extensions, so keep them to a plain token.
pub fn validate_container(container: &str) -> Result<String, AppError> {
    let trimmed = container.trim().trim_start_matches('.');
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::InvalidContainer(container.to_string()));
    }
    Ok(trimmed.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_names() {
        assert_eq!(validate_container("mp4").unwrap(), "mp4");
        assert_eq!(validate_container(".MKV").unwrap(), "mkv");
        assert!(validate_container("").is_err());
        assert!(validate_container("mp4/../x").is_err());
    }
}
