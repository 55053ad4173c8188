use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    #[error("Camera settings could not be loaded: {0}")]
    SettingsLoad(String),

    #[error("Unknown camera group '{0}'")]
    UnknownGroup(String),

    #[error("Unknown camera '{camera}' in group '{group}'")]
    UnknownCamera { group: String, camera: String },

    #[error("A recording session is already active (group '{0}')")]
    AlreadyActive(String),

    #[error("No active recording session")]
    NoActiveSession,

    #[error("Invalid container format '{0}'")]
    InvalidContainer(String),

    #[error("Capture engine failed to start for camera {camera}: {details}")]
    EngineSpawn { camera: String, details: String },

    #[error("Camera {camera} did not stop within {timeout_secs:.1}s and was killed")]
    GracefulStopTimeout { camera: String, timeout_secs: f64 },

    #[error("Stream probe failed: {0}")]
    Probe(String),

    #[error("File I/O Error: {0}")]
    Io(String),

    #[error("Task Execution Error: {0}")]
    Task(String),
}

// Allow conversion from std::io::Error to AppError::Io
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}
