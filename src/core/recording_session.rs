use crate::camera_config::CameraGroup;
use crate::common::file_utils;
use crate::common::timestamp_utils::format_elapsed;
use crate::core::capture_engine::CaptureEngine;
use crate::core::capture_task::{CaptureTask, TaskState, TaskSummary};
use crate::errors::AppError;
use chrono::{DateTime, Local};
use futures::future::join_all;
use log::{debug, info, warn};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Active,
    Stopping,
    Finished,
}

/// Read-only view of a running session handed to the front end.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub session_id: u64,
    pub group_name: String,
    pub container: String,
    pub output_folder: PathBuf,
    pub started_at: DateTime<Local>,
    pub tasks: Vec<TaskSummary>,
}

impl SessionHandle {
    pub fn running_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.state == TaskState::Running).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &TaskSummary> {
        self.tasks.iter().filter(|t| t.state == TaskState::Failed)
    }
}

/// Outcome of stopping every task of a session.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub session_id: u64,
    pub group_name: String,
    pub output_folder: PathBuf,
    pub started_at: DateTime<Local>,
    pub duration: Duration,
    pub tasks: Vec<TaskSummary>,
}

impl SessionReport {
    pub fn stopped_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.state == TaskState::Stopped).count()
    }

    pub fn failed_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.state == TaskState::Failed).count()
    }

    pub fn forced_kill_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.forced_kill).count()
    }
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Recording '{}' finished after {} in {} ({} stopped, {} failed)",
            self.group_name,
            format_elapsed(self.duration),
            self.output_folder.display(),
            self.stopped_count(),
            self.failed_count()
        )?;
        for task in &self.tasks {
            write!(f, "  {} [{}] {}", task.camera_name, task.state, task.destination_path.display())?;
            if task.forced_kill {
                write!(f, " (killed after grace timeout)")?;
            }
            if let Some(failure) = &task.failure {
                if !task.forced_kill {
                    write!(f, " - {}", failure)?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// A group of capture tasks started together into one output folder.
#[derive(Debug)]
pub struct RecordingSession {
    session_id: u64,
    group_name: String,
    container: String,
    output_folder: PathBuf,
    started_at: DateTime<Local>,
    started_instant: Instant,
    tasks: Vec<CaptureTask>,
    state: SessionState,
}

impl RecordingSession {
    /// Creates `output_folder` and starts one task per group member.
    ///
    /// Only a folder that cannot be created fails the session. A camera whose
    /// engine cannot be spawned is kept as a `Failed` task and the rest record.
    pub fn begin(
        session_id: u64,
        group: &CameraGroup,
        output_folder: &Path,
        container: &str,
        engine: &dyn CaptureEngine,
    ) -> Result<Self, AppError> {
        let begin_start = Instant::now();
        let output_folder = file_utils::ensure_output_directory(output_folder)?;
        debug!("📁 Session #{} output folder ready: {}", session_id, output_folder.display());

        let mut session = RecordingSession {
            session_id,
            group_name: group.group_name.clone(),
            container: container.to_string(),
            output_folder,
            started_at: Local::now(),
            started_instant: Instant::now(),
            tasks: Vec::with_capacity(group.members.len()),
            state: SessionState::Idle,
        };

        for (id, camera) in group.members.iter().enumerate() {
            let destination = file_utils::destination_path(&session.output_folder, &camera.output_base_name, container);
            session.tasks.push(CaptureTask::start(id, camera, &destination, engine));
        }
        session.state = SessionState::Active;

        let failed = session.tasks.iter().filter(|t| t.state() == TaskState::Failed).count();
        if failed > 0 {
            warn!(
                "⚠️ Session #{} for '{}' started with {} of {} camera(s) failing.",
                session_id,
                session.group_name,
                failed,
                session.tasks.len()
            );
        }
        info!(
            "🚀 Session #{} for '{}' active with {} camera(s) in {:?}",
            session_id,
            session.group_name,
            session.tasks.len() - failed,
            begin_start.elapsed()
        );
        Ok(session)
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    pub fn output_folder(&self) -> &Path {
        &self.output_folder
    }

    pub fn elapsed(&self) -> Duration {
        self.started_instant.elapsed()
    }

    pub fn tasks(&self) -> &[CaptureTask] {
        &self.tasks
    }

    /// Polls every task for engines that exited on their own and returns the
    /// ones that failed since the last poll.
    pub fn refresh(&mut self) -> Vec<TaskSummary> {
        let mut newly_failed = Vec::new();
        for task in &mut self.tasks {
            let before = task.state();
            if task.refresh() == TaskState::Failed && before == TaskState::Running {
                newly_failed.push(task.summary());
            }
        }
        newly_failed
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            session_id: self.session_id,
            group_name: self.group_name.clone(),
            container: self.container.clone(),
            output_folder: self.output_folder.clone(),
            started_at: self.started_at,
            tasks: self.tasks.iter().map(|t| t.summary()).collect(),
        }
    }

    /// One line per camera: `name: state` plus the failure if any.
    pub fn status_lines(&self) -> Vec<String> {
        self.tasks
            .iter()
            .map(|task| match task.failure() {
                Some(failure) => format!("{}: {} - {}", task.camera_name(), task.state(), failure),
                None => format!("{}: {}", task.camera_name(), task.state()),
            })
            .collect()
    }

    /// Stops every task and consumes the session.
    ///
    /// Quit requests go out to all tasks at once in task-id order; the report
    /// is built only after each task is `Stopped` or `Failed`.
    pub async fn end_all(mut self, grace_timeout: Duration) -> SessionReport {
        let end_start = Instant::now();
        debug_assert_eq!(self.state, SessionState::Active);
        self.state = SessionState::Stopping;
        info!(
            "🛑 Stopping session #{} ('{}'): {} task(s), grace timeout {:?}",
            self.session_id,
            self.group_name,
            self.tasks.len(),
            grace_timeout
        );

        self.tasks.sort_by_key(|t| t.id());
        join_all(self.tasks.iter_mut().map(|task| task.stop(grace_timeout))).await;

        debug_assert!(self.tasks.iter().all(|t| t.state().is_terminal()));
        self.state = SessionState::Finished;

        let report = SessionReport {
            session_id: self.session_id,
            group_name: self.group_name.clone(),
            output_folder: self.output_folder.clone(),
            started_at: self.started_at,
            duration: self.started_instant.elapsed(),
            tasks: self.tasks.iter().map(|t| t.summary()).collect(),
        };
        info!(
            "🏁 Session #{} finished in {:?}: {} stopped, {} failed, {} forced kill(s).",
            self.session_id,
            end_start.elapsed(),
            report.stopped_count(),
            report.failed_count(),
            report.forced_kill_count()
        );
        report
    }
}
