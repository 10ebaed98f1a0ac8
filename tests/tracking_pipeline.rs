//! Processor behavior over many frames and the full pipeline over loopback UDP.

use approx::{assert_abs_diff_eq, assert_relative_eq};
use headtrack::config::{ReceiverMode, TrackingConfig};
use headtrack::math::calculate_smoothing_factor;
use headtrack::pipeline::{PipelineHandle, TrackingFrame};
use headtrack::pose::{DeadzoneSettings, SensitivitySettings};
use headtrack::processing::TrackingProcessor;
use headtrack::protocol::OpenTrackPacket;
use std::net::{Ipv4Addr, UdpSocket};
use std::time::Duration;
use tokio::sync::watch;

#[test]
fn smoothing_is_frame_rate_independent() {
    let mut at_30 = TrackingProcessor::new();
    let mut at_120 = TrackingProcessor::new();
    at_30.set_smoothing(0.6);
    at_120.set_smoothing(0.6);
    at_30.process(0.0, 0.0, 0.0, false, 1.0 / 30.0);
    at_120.process(0.0, 0.0, 0.0, false, 1.0 / 120.0);

    // same half second of wall time at two frame rates
    let mut yaw_30 = 0.0;
    for _ in 0..15 {
        yaw_30 = at_30.process(20.0, 0.0, 0.0, false, 1.0 / 30.0).yaw;
    }
    let mut yaw_120 = 0.0;
    for _ in 0..60 {
        yaw_120 = at_120.process(20.0, 0.0, 0.0, false, 1.0 / 120.0).yaw;
    }

    assert_relative_eq!(yaw_30, yaw_120, max_relative = 1e-3);
}

#[test]
fn single_step_matches_smoothing_factor() {
    let mut processor = TrackingProcessor::new();
    processor.set_smoothing(0.5);
    processor.process(0.0, 0.0, 0.0, false, 0.02);
    let pose = processor.process(10.0, 0.0, 0.0, false, 0.02);

    let expected = 10.0 * calculate_smoothing_factor(0.5, 0.02_f32 as f64);
    assert_relative_eq!(pose.yaw as f64, expected, max_relative = 1e-5);
}

#[test]
fn full_stack_ordering() {
    let mut processor = TrackingProcessor::new();
    processor.set_deadzone(DeadzoneSettings::uniform(1.0));
    processor.set_sensitivity(SensitivitySettings {
        yaw: 3.0,
        invert_roll: true,
        ..SensitivitySettings::default()
    });
    processor.recenter_to(5.0, 5.0, 5.0);

    // offset (5) then deadzone (1) then sensitivity
    let pose = processor.process(9.0, 5.5, 8.0, false, 0.016);
    assert_abs_diff_eq!(pose.yaw, 9.0);
    assert_abs_diff_eq!(pose.pitch, 0.0);
    assert_abs_diff_eq!(pose.roll, -2.0);
}

#[test]
fn long_session_settles_without_drift() {
    let mut processor = TrackingProcessor::new();
    processor.set_smoothing(0.3);
    for i in 0..100_000 {
        let yaw = if i % 2 == 0 { 45.001 } else { 44.999 };
        processor.process(yaw, -12.0, 3.0, false, 1.0 / 240.0);
    }
    let (yaw, pitch, roll) = processor.smoothed_rotation();
    assert_abs_diff_eq!(yaw, 45.0, epsilon = 0.01);
    assert_abs_diff_eq!(pitch, -12.0, epsilon = 1e-4);
    assert_abs_diff_eq!(roll, 3.0, epsilon = 1e-4);
}

async fn next_frame(
    frames: &mut watch::Receiver<Option<TrackingFrame>>,
    mut predicate: impl FnMut(&TrackingFrame) -> bool,
) -> TrackingFrame {
    tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            if let Some(frame) = *frames.borrow_and_update() {
                if predicate(&frame) {
                    return frame;
                }
            }
            frames.changed().await.unwrap();
        }
    })
    .await
    .unwrap()
}

async fn run_over_udp(mode: ReceiverMode) {
    let mut config = TrackingConfig::default();
    config.receiver.port = 0;
    config.receiver.mode = mode;
    config.pipeline.frame_interval_ms = 2;
    config.pipeline.stats_interval_secs = 0;

    let handle = PipelineHandle::spawn_udp(config).unwrap();
    let port = handle.local_port().unwrap();
    let mut frames = handle.subscribe();
    assert!(handle.latest().is_none());

    let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    socket
        .send_to(
            &OpenTrackPacket::encode(8.0, -4.0, 2.0),
            (Ipv4Addr::LOCALHOST, port),
        )
        .unwrap();

    let frame = next_frame(&mut frames, |_| true).await;
    assert_eq!(frame.raw, (8.0, -4.0, 2.0));
    assert!(frame.connected);
    assert!(!frame.remote);

    handle.recenter().await.unwrap();
    next_frame(&mut frames, |f| f.pose.yaw.abs() < 1e-4).await;

    socket
        .send_to(
            &OpenTrackPacket::encode(10.0, -4.0, 2.0),
            (Ipv4Addr::LOCALHOST, port),
        )
        .unwrap();
    let frame = next_frame(&mut frames, |f| f.raw.0 == 10.0).await;
    assert_abs_diff_eq!(frame.pose.yaw, 2.0, epsilon = 1e-4);
    assert_abs_diff_eq!(frame.pose.pitch, 0.0, epsilon = 1e-4);

    handle.shutdown().await;
}

#[tokio::test]
async fn pipeline_over_udp_polling() {
    run_over_udp(ReceiverMode::Polling).await;
}

#[tokio::test]
async fn pipeline_over_udp_threaded() {
    run_over_udp(ReceiverMode::Threaded).await;
}
