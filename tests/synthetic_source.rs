mod common;

use common::*;
use record_video_imu::bundle::RecordedSession;
use record_video_imu::capture::{FrameSink, FrameSource, SyntheticConfig, SyntheticFrameSource};
use record_video_imu::recorder::{CaptureMode, CaptureSessionController};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn synthetic(frames: Option<u64>, paced: bool) -> SyntheticConfig {
    SyntheticConfig {
        width: WIDTH,
        height: HEIGHT,
        depth_width: 4,
        depth_height: 3,
        fps: 120,
        frame_count: frames,
        start_timestamp: 5000.0,
        paced,
        missing_depth_every: Some(4),
        motion_warmup_frames: 2,
    }
}

#[tokio::test]
async fn test_synthetic_frames_recorded_end_to_end() {
    let dir = tempdir().unwrap();
    let factory = LoggingEncoderFactory::new();
    let mut source = SyntheticFrameSource::new(synthetic(Some(24), false));
    let controller = Arc::new(CaptureSessionController::new(
        config(dir.path()),
        factory.clone(),
        source.motion(),
    ));

    controller.start_recording().unwrap();
    let sink: Arc<dyn FrameSink> = controller.clone();
    source.start(sink).await.unwrap();
    assert_eq!(source.wait().unwrap(), 24);

    let stats = controller.end_recording().unwrap();
    controller.wait_for_finalization().unwrap().unwrap();

    // Frames 1 and 2 precede the first motion sample, every 4th lacks depth
    assert_eq!(stats.skipped.missing_motion, 2);
    assert_eq!(stats.skipped.missing_depth, 6);
    assert_eq!(stats.video_frames, 16);
    assert_eq!(stats.origin_seconds, Some(5000.0));

    let session = RecordedSession::load(controller.layout()).unwrap();
    assert_eq!(session.imu_rows.len(), 16);
    assert_eq!(session.depth_frames.len(), 16);
    assert!(session.depth_frames.iter().all(|f| f.byte_len == 4 * 3 * 4));
    assert_eq!(factory.log.last_session().len(), 16);

    let imu_times: Vec<f64> = session.imu_rows.iter().map(|r| r.relative_seconds).collect();
    let depth_times: Vec<f64> = session.depth_frames.iter().map(|f| f.relative_seconds).collect();
    assert_eq!(imu_times, depth_times);
}

#[tokio::test]
async fn test_capture_lifecycle_prepares_data_root() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("Data");
    std::fs::create_dir_all(root.join("calibration")).unwrap();
    std::fs::write(root.join("calibration").join("1_calibration.png"), b"old").unwrap();
    std::fs::write(root.join("imuData.csv"), b"stale\n").unwrap();

    let mut source = SyntheticFrameSource::new(synthetic(None, true));
    let controller = Arc::new(CaptureSessionController::new(
        config(&root),
        LoggingEncoderFactory::new(),
        source.motion(),
    ));

    controller.begin_capture(&mut source).await.unwrap();
    assert!(source.is_running());
    assert!(root.join("calibration").is_dir());
    assert!(file_names(&root.join("calibration")).is_empty());
    assert!(!root.join("imuData.csv").exists());

    let mut preview = controller.preview();
    preview.changed().await.unwrap();
    assert!(preview.borrow().is_some());

    controller.start_recording().unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    controller.end_capture(&mut source).await.unwrap();

    assert!(!source.is_running());
    assert_eq!(controller.mode(), CaptureMode::Idle);
    controller.wait_for_finalization().unwrap().unwrap();

    let session = RecordedSession::load(controller.layout()).unwrap();
    assert_eq!(session.imu_rows.len(), session.depth_frames.len());
    assert!(session.video_path.is_some());
}
