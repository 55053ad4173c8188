pub mod capture_engine;
pub mod capture_task;
pub mod recording_session;
pub mod session_supervisor;
pub mod preview;
