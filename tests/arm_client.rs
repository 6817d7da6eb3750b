use armdmux::arm::{Arm, ArmClient, ArmError, Direction, Point};
use armdmux::motion::arc::{ArcSettings, ArcSweep};
use tokio_test::io::Builder;

#[tokio::test]
async fn test_move_straight_wire_format() {
    let mock = Builder::new()
        .write(b"1 510.000 0.000 -100.000\r\n")
        .read(b"OK\r\n")
        .build();
    let mut arm = ArmClient::new(mock);
    arm.move_straight(Point::new(510.0, 0.0, -100.0)).await.unwrap();
    assert_eq!(arm.position(), Point::new(510.0, 0.0, -100.0));
}

#[tokio::test]
async fn test_move_to_rounds_to_three_decimals() {
    let mock = Builder::new()
        .write(b"0 1.235 -2.000 0.001\r\n")
        .read(b"OK 1.235 -2.000 0.001\r\n")
        .build();
    let mut arm = ArmClient::new(mock);
    arm.move_to(Point::new(1.23456, -2.0, 0.0009)).await.unwrap();
}

#[tokio::test]
async fn test_rejected_move_keeps_position() {
    let mock = Builder::new()
        .write(b"1 900.000 0.000 0.000\r\n")
        .read(b"ERR out of reach\r\n")
        .build();
    let mut arm = ArmClient::new(mock);
    let err = arm.move_straight(Point::new(900.0, 0.0, 0.0)).await.unwrap_err();
    match err {
        ArmError::Rejected { reply } => assert_eq!(reply, "ERR out of reach"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(arm.position(), Point::default());
}

#[tokio::test]
async fn test_blank_reply_lines_are_skipped() {
    let mock = Builder::new()
        .write(b"0 1.000 2.000 3.000\r\n")
        .read(b"\r\n\r\n")
        .read(b"OK\r\n")
        .build();
    let mut arm = ArmClient::new(mock);
    arm.move_to(Point::new(1.0, 2.0, 3.0)).await.unwrap();
}

#[tokio::test]
async fn test_resync_adopts_reported_position() {
    let mock = Builder::new().write(b"2\r\n").read(b"OK 12.5 -3 400\r\n").build();
    let mut arm = ArmClient::new(mock);
    let position = arm.resync().await.unwrap();
    assert_eq!(position, Point::new(12.5, -3.0, 400.0));
    assert_eq!(arm.position(), position);
}

#[tokio::test]
async fn test_resync_malformed_reply() {
    let mock = Builder::new().write(b"2\r\n").read(b"OK 12.5 -3\r\n").build();
    let mut arm = ArmClient::new(mock);
    assert!(matches!(arm.resync().await, Err(ArmError::MalformedReply { .. })));
}

#[tokio::test]
async fn test_closed_link_is_disconnected() {
    let mock = Builder::new().write(b"0 0.000 0.000 0.000\r\n").build();
    let mut arm = ArmClient::new(mock);
    assert!(matches!(arm.move_to(Point::default()).await, Err(ArmError::Disconnected)));
}

#[tokio::test]
async fn test_arc_is_sent_as_straight_segments() {
    // Half circle of radius 1 with 2 mm segments: two segments.
    let settings = ArcSettings { sweep: ArcSweep::Directional, segment_length: 2.0 };
    let mock = Builder::new()
        .write(b"0 1.000 0.000 0.000\r\n")
        .read(b"OK\r\n")
        .write(b"1 -0.416 0.909 0.000\r\n")
        .read(b"OK\r\n")
        .write(b"1 -1.000 0.000 0.000\r\n")
        .read(b"OK\r\n")
        .build();
    let mut arm = ArmClient::new(mock);
    arm.move_to(Point::new(1.0, 0.0, 0.0)).await.unwrap();
    arm.arc_center(Point::new(-1.0, 0.0, 0.0), Point::default(), Direction::CounterClockwise, settings)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_failed_arc_segment_reports_its_point() {
    let settings = ArcSettings { sweep: ArcSweep::Directional, segment_length: 2.0 };
    let mock = Builder::new()
        .write(b"0 1.000 0.000 0.000\r\n")
        .read(b"OK\r\n")
        .write(b"1 -0.416 0.909 0.000\r\n")
        .read(b"ERR singularity\r\n")
        .build();
    let mut arm = ArmClient::new(mock);
    arm.move_to(Point::new(1.0, 0.0, 0.0)).await.unwrap();
    let err = arm
        .arc_center(Point::new(-1.0, 0.0, 0.0), Point::default(), Direction::CounterClockwise, settings)
        .await
        .unwrap_err();
    match err {
        ArmError::ArcSegment { point, source } => {
            assert!((point.x - 2.0_f64.cos()).abs() < 1e-9 && (point.y - 2.0_f64.sin()).abs() < 1e-9);
            assert!(matches!(*source, ArmError::Rejected { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(arm.position(), Point::new(1.0, 0.0, 0.0));
}
