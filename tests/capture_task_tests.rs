#![cfg(unix)]

mod common;

use common::{camera, group, StubEngine};
use rtsp_recorder::core::capture_engine::FfmpegEngine;
use rtsp_recorder::core::capture_task::{CaptureTask, TaskFailure, TaskState};
use rtsp_recorder::core::recording_session::RecordingSession;
use rtsp_recorder::errors::AppError;
use std::time::{Duration, Instant};

#[tokio::test]
async fn obedient_engine_stops_cleanly() {
    let tmp = tempfile::tempdir().unwrap();
    let dest = tmp.path().join("lobby_cam.mp4");
    let engine = StubEngine::default();

    let mut task = CaptureTask::start(0, &camera("lobby_cam", "rtsp://cam1/stream"), &dest, &engine);
    assert_eq!(task.state(), TaskState::Running);
    assert!(dest.exists());

    task.stop(Duration::from_secs(3)).await;
    let summary = task.summary();
    assert_eq!(summary.state, TaskState::Stopped);
    assert_eq!(summary.exit_code, Some(0));
    assert!(!summary.forced_kill);
    assert!(summary.failure.is_none());
}

#[tokio::test]
async fn hung_engine_is_killed_within_bounded_time() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = StubEngine::default();
    let mut task = CaptureTask::start(0, &camera("frozen", "rtsp://hung/stream"), &tmp.path().join("frozen.mp4"), &engine);

    let stop_start = Instant::now();
    task.stop(Duration::from_millis(250)).await;
    let elapsed = stop_start.elapsed();

    assert!(elapsed >= Duration::from_millis(250));
    assert!(elapsed < Duration::from_secs(5));
    assert_eq!(task.state(), TaskState::Failed);
    assert!(task.forced_kill());
    assert!(matches!(
        task.failure(),
        Some(TaskFailure::ForcedKill(AppError::GracefulStopTimeout { camera, .. })) if camera == "frozen"
    ));
}

#[tokio::test]
async fn stop_is_a_no_op_for_a_failed_task() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = StubEngine::default();
    let mut task = CaptureTask::start(3, &camera("second", "rtsp://missing/stream"), &tmp.path().join("second.mp4"), &engine);

    assert_eq!(task.state(), TaskState::Failed);
    assert_eq!(engine.spawn_count(), 0);
    let before = task.summary();

    task.stop(Duration::from_secs(1)).await;
    task.stop(Duration::from_secs(1)).await;
    assert_eq!(task.summary(), before);
    assert!(matches!(
        task.failure(),
        Some(TaskFailure::Spawn(AppError::EngineSpawn { camera, .. })) if camera == "second"
    ));
}

#[tokio::test]
async fn stopping_twice_leaves_the_first_outcome() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = StubEngine::default();
    let mut task = CaptureTask::start(0, &camera("gate", "rtsp://cam4/stream"), &tmp.path().join("gate.mp4"), &engine);

    task.stop(Duration::from_secs(3)).await;
    let first = task.summary();
    task.stop(Duration::from_secs(3)).await;
    assert_eq!(task.summary(), first);
    assert_eq!(first.state, TaskState::Stopped);
}

#[tokio::test]
async fn engine_finishing_by_itself_is_reaped_by_wait() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = StubEngine::default();
    let mut task = CaptureTask::start(0, &camera("clip", "rtsp://short/stream"), &tmp.path().join("clip.mp4"), &engine);

    let status = tokio::time::timeout(Duration::from_secs(5), task.wait()).await.unwrap();
    assert!(status.unwrap().success());
    assert_eq!(task.state(), TaskState::Stopped);
}

#[tokio::test]
async fn crashing_engine_keeps_its_last_diagnostic() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = StubEngine::default();
    let mut task = CaptureTask::start(0, &camera("crasher", "rtsp://crash/stream"), &tmp.path().join("crasher.mp4"), &engine);

    tokio::time::timeout(Duration::from_secs(5), task.wait()).await.unwrap();
    assert_eq!(task.state(), TaskState::Failed);
    assert!(matches!(task.failure(), Some(TaskFailure::UnexpectedExit(_))));
    assert_eq!(task.summary().exit_code, Some(1));

    // The stderr reader runs on its own task; give it a moment to drain.
    let mut diagnostic = None;
    for _ in 0..50 {
        diagnostic = task.last_diagnostic();
        if diagnostic.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(diagnostic.as_deref(), Some("Connection refused"));
}

#[tokio::test]
async fn missing_ffmpeg_binary_fails_every_task_but_not_the_session() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = FfmpegEngine::new("/nonexistent/ffmpeg", "/nonexistent/ffprobe", None);
    let yard = group(
        "Yard",
        vec![camera("north", "rtsp://cam2/stream"), camera("south", "rtsp://cam3/stream")],
    );

    let session = RecordingSession::begin(1, &yard, &tmp.path().join("20240101_120000"), "mp4", &engine).unwrap();
    let handle = session.handle();
    assert_eq!(handle.tasks.len(), 2);
    assert_eq!(handle.running_count(), 0);
    for task in &handle.tasks {
        assert_eq!(task.state, TaskState::Failed);
        assert!(task.failure.as_deref().unwrap().contains("/nonexistent/ffmpeg"));
    }
    // The folder is created even though nothing records into it.
    assert!(tmp.path().join("20240101_120000").is_dir());

    let report = session.end_all(Duration::from_secs(1)).await;
    assert_eq!(report.failed_count(), 2);
    assert_eq!(report.forced_kill_count(), 0);
}

#[tokio::test]
async fn session_tasks_follow_group_order() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = StubEngine::default();
    let yard = group(
        "Yard",
        vec![
            camera("north", "rtsp://cam2/stream"),
            camera("south", "rtsp://cam3/stream"),
            camera("gate", "rtsp://cam4/stream"),
        ],
    );

    let session = RecordingSession::begin(7, &yard, tmp.path(), "mkv", &engine).unwrap();
    let names: Vec<_> = session.tasks().iter().map(|t| (t.id(), t.camera_name())).collect();
    assert_eq!(names, vec![(0, "north"), (1, "south"), (2, "gate")]);
    assert_eq!(session.tasks()[2].destination_path(), tmp.path().join("gate.mkv"));

    let report = session.end_all(Duration::from_secs(3)).await;
    assert_eq!(report.session_id, 7);
    assert_eq!(report.stopped_count(), 3);
    let ids: Vec<_> = report.tasks.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![0, 1, 2]);
}
