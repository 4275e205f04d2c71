#![allow(clippy::float_cmp)]

use std::f64::consts::FRAC_PI_2;

use super::*;
use crate::test_helpers::{FakeApi, Write, calibration, node};

fn scenario_calibration() -> Calibration {
    Calibration {
        image_url: "https://img.test/floor1.png".into(),
        floor: 1,
        x_pixel_offset: 10.0,
        y_pixel_offset: 20.0,
        x_scale: 2.0,
        y_scale: 2.0,
        img_width: 1000.0,
        img_height: 1000.0,
        ..Calibration::default()
    }
}

fn editing(n: &Node, cal: &Calibration) -> NodeEditor {
    let mut editor = NodeEditor::default();
    assert_eq!(editor.toggle(), Toggle::Selecting);
    editor.select(n, cal).unwrap();
    editor
}

// =============================================================
// Field bounds
// =============================================================

#[test]
fn cyclic_input_wraps_at_bounds() {
    let rot = FieldBounds::rotation();
    assert_eq!(rot.accept("0"), Some(360.0));
    assert_eq!(rot.accept("360"), Some(0.0));
    assert_eq!(rot.accept(""), Some(0.0));
    assert_eq!(rot.accept("45"), Some(45.0));
    assert_eq!(rot.accept("400"), None);
    assert_eq!(rot.accept("abc"), None);
}

#[test]
fn cyclic_input_reads_integer_prefix() {
    let pos = FieldBounds::position(WrapPolicy::Cyclic);
    assert_eq!(pos.accept("42.7"), Some(42.0));
    assert_eq!(pos.accept("12px"), Some(12.0));
}

#[test]
fn clamp_policy_holds_position_in_range() {
    let pos = FieldBounds::position(WrapPolicy::Clamp);
    assert_eq!(pos.accept("0"), Some(0.0));
    assert_eq!(pos.accept("100"), Some(100.0));
    assert_eq!(pos.accept("150"), Some(100.0));
    assert_eq!(pos.accept("-3"), Some(0.0));
    assert_eq!(pos.accept("x"), None);
}

#[test]
fn rotation_step_wraps_through_bounds() {
    let rot = FieldBounds::rotation();
    assert_eq!(rot.step_from(0.0, true), Some(15.0));
    assert_eq!(rot.step_from(345.0, true), Some(0.0));
    assert_eq!(rot.step_from(0.0, false), Some(360.0));
    assert_eq!(rot.step_from(90.0, false), Some(75.0));
}

#[test]
fn clamp_step_stops_at_bounds() {
    let pos = FieldBounds::position(WrapPolicy::Clamp);
    assert_eq!(pos.step_from(100.0, true), Some(100.0));
    assert_eq!(pos.step_from(0.0, false), Some(0.0));
}

// =============================================================
// State machine
// =============================================================

#[test]
fn toggle_cycles_viewing_and_selecting() {
    let mut editor = NodeEditor::default();
    assert_eq!(editor.toggle(), Toggle::Selecting);
    assert!(editor.is_selecting());
    assert_eq!(editor.toggle(), Toggle::Viewing);
    assert_eq!(editor.state(), &EditorState::Viewing);
}

#[test]
fn select_outside_selecting_is_rejected() {
    let mut editor = NodeEditor::default();
    let n = node("a", 1, 100.0, 100.0, &[], 0);
    assert!(matches!(editor.select(&n, &calibration(1)), Err(EditError::NotSelecting)));
}

#[test]
fn select_requires_placement_and_calibration() {
    let mut editor = NodeEditor::default();
    editor.toggle();
    let mut unplaced = node("a", 1, 0.0, 0.0, &[], 0);
    unplaced.placement = None;
    assert!(matches!(editor.select(&unplaced, &calibration(1)), Err(EditError::NotPlaced(_))));

    let placed = node("b", 1, 0.0, 0.0, &[], 0);
    assert!(matches!(editor.select(&placed, &Calibration::default()), Err(EditError::MissingCalibration)));
    assert!(editor.is_selecting());
}

#[test]
fn select_initializes_working_values_from_calibration() {
    let mut n = node("n", 1, 500.0, 300.0, &[], 0);
    if let Some(p) = n.placement.as_mut() {
        p.rotation = FRAC_PI_2;
    }
    let editor = editing(&n, &scenario_calibration());
    let session = editor.session().unwrap();

    assert!((session.working.x - 102.0).abs() < 1e-9);
    assert!((session.working.y - 64.0).abs() < 1e-9);
    assert_eq!(session.working.rotation_deg, 90.0);
    assert_eq!(session.working.name, "Room n");
    assert_eq!(session.committed_rotation_display(), 90.0);
    assert!(!editor.is_dirty());
}

#[test]
fn input_without_session_is_not_editing() {
    let mut editor = NodeEditor::default();
    assert!(matches!(editor.set_input(EditField::X, "5"), Err(EditError::NotEditing)));
    assert!(matches!(editor.step(EditField::Rotation, true), Err(EditError::NotEditing)));
    assert!(matches!(editor.set_name("x"), Err(EditError::NotEditing)));
}

#[test]
fn ignored_input_keeps_previous_value() {
    let mut editor = editing(&node("n", 1, 100.0, 100.0, &[], 0), &calibration(1));
    assert_eq!(editor.set_input(EditField::Rotation, "30").unwrap(), 30.0);
    assert_eq!(editor.set_input(EditField::Rotation, "999").unwrap(), 30.0);
}

#[test]
fn dirty_flag_tracks_snapshot() {
    let mut editor = editing(&node("n", 1, 100.0, 100.0, &[], 0), &calibration(1));
    assert!(!editor.is_dirty());

    editor.step(EditField::Rotation, true).unwrap();
    assert!(editor.is_dirty());

    // stepping down lands on the minimum, which wraps to 360
    assert_eq!(editor.step(EditField::Rotation, false).unwrap(), 360.0);
    assert!(editor.is_dirty());

    editor.set_input(EditField::Rotation, "").unwrap();
    assert!(!editor.is_dirty());

    editor.set_name("  Room n ").unwrap();
    assert!(!editor.is_dirty());
    editor.set_name("Lobby").unwrap();
    assert!(editor.is_dirty());
}

#[test]
fn toggle_while_editing_requests_save_only_when_dirty() {
    let mut editor = editing(&node("n", 1, 100.0, 100.0, &[], 0), &calibration(1));
    editor.move_to(Point::new(20.0, 20.0)).unwrap();
    assert_eq!(editor.toggle(), Toggle::SaveRequested);
    assert!(editor.session().is_some());

    editor.move_to(Point::new(10.0, 10.0)).unwrap();
    assert_eq!(editor.toggle(), Toggle::Viewing);
    assert!(editor.session().is_none());
}

#[test]
fn cancel_and_reset_discard_session() {
    let mut editor = editing(&node("n", 1, 100.0, 100.0, &[], 0), &calibration(1));
    editor.cancel();
    assert_eq!(editor.state(), &EditorState::Viewing);

    let mut editor = editing(&node("n", 1, 100.0, 100.0, &[], 0), &calibration(1));
    editor.reset();
    assert_eq!(editor.state(), &EditorState::Viewing);
}

// =============================================================
// Save
// =============================================================

#[tokio::test]
async fn clean_session_save_issues_no_writes() {
    let api = FakeApi::new();
    let cal = calibration(1);
    let mut editor = editing(&node("n", 1, 100.0, 100.0, &[], 0), &cal);

    assert!(matches!(editor.save(&api, &cal).await, Err(EditError::NoChanges)));
    assert!(api.recorded_writes().is_empty());
    assert!(editor.session().is_some());
}

#[tokio::test]
async fn save_converts_percent_and_degrees_back() {
    let api = FakeApi::new();
    let cal = scenario_calibration();
    let mut editor = editing(&node("n", 1, 500.0, 300.0, &[], 0), &cal);

    editor.set_input(EditField::X, "60").unwrap();
    editor.set_input(EditField::Y, "40").unwrap();
    editor.set_input(EditField::Rotation, "90").unwrap();
    let saved = editor.save(&api, &cal).await.unwrap();

    let writes = api.recorded_writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0], Write::Coordinates { tiles_id: "n".into(), x: 290.0, y: 180.0 });
    match &writes[1] {
        Write::Rotation { tiles_id, radians } => {
            assert_eq!(tiles_id, "n");
            assert!((radians - FRAC_PI_2).abs() < 1e-12);
        }
        other => panic!("expected rotation write, got {other:?}"),
    }

    assert_eq!(saved.placement.x, 290.0);
    assert_eq!(saved.placement.y, 180.0);
    assert_eq!(saved.placement.floor, 1);
    assert_eq!(saved.name, "Room n");
    assert_eq!(editor.state(), &EditorState::Viewing);
}

#[tokio::test]
async fn rotation_only_save_keeps_raw_position() {
    let api = FakeApi::new();
    let cal = scenario_calibration();
    let mut editor = editing(&node("n", 1, 500.0, 300.0, &[], 0), &cal);

    editor.set_input(EditField::Rotation, "90").unwrap();
    let saved = editor.save(&api, &cal).await.unwrap();

    assert_eq!(api.recorded_writes()[0], Write::Coordinates { tiles_id: "n".into(), x: 500.0, y: 300.0 });
    assert_eq!((saved.placement.x, saved.placement.y), (500.0, 300.0));
}

#[tokio::test]
async fn dragged_marker_lands_back_on_its_pixels() {
    let api = FakeApi::new();
    let cal = scenario_calibration();
    let mut editor = editing(&node("n", 1, 500.0, 300.0, &[], 0), &cal);

    // Selected at (102, 64); y ends where it started.
    editor.move_to(Point::new(50.0, 50.0)).unwrap();
    editor.move_to(Point::new(102.5, 64.0)).unwrap();
    editor.save(&api, &cal).await.unwrap();

    match &api.recorded_writes()[0] {
        Write::Coordinates { x, y, .. } => {
            assert!((x - 502.5).abs() < 1e-9);
            assert!((y - 300.0).abs() < 1e-9);
        }
        other => panic!("expected coordinates write, got {other:?}"),
    }
}

#[tokio::test]
async fn changed_name_is_written_last() {
    let api = FakeApi::new();
    let cal = calibration(1);
    let mut editor = editing(&node("n", 1, 100.0, 100.0, &[], 0), &cal);
    editor.set_name(" Lobby ").unwrap();

    let saved = editor.save(&api, &cal).await.unwrap();
    let writes = api.recorded_writes();
    assert_eq!(writes.len(), 3);
    assert_eq!(writes[2], Write::Name { tiles_id: "n".into(), name: "Lobby".into() });
    assert_eq!(saved.name, "Lobby");

    let mut n = node("n", 1, 100.0, 100.0, &[], 0);
    saved.apply_to(&mut n);
    assert_eq!(n.name, "Lobby");
}

#[tokio::test]
async fn first_write_failure_needs_no_compensation() {
    let api = FakeApi::new();
    api.fail_next_writes(vec![Some(ApiError::Request("down".into()))]);
    let cal = calibration(1);
    let mut editor = editing(&node("n", 1, 100.0, 100.0, &[], 0), &cal);
    editor.step(EditField::Rotation, true).unwrap();

    match editor.save(&api, &cal).await {
        Err(EditError::WriteFailed { stage, compensation, .. }) => {
            assert_eq!(stage, WriteStage::Coordinates);
            assert_eq!(compensation, Compensation::NotNeeded);
        }
        other => panic!("expected write failure, got {other:?}"),
    }
    assert!(api.recorded_writes().is_empty());
    assert!(editor.is_dirty());
}

#[tokio::test]
async fn later_failure_reverts_earlier_writes() {
    let api = FakeApi::new();
    api.fail_next_writes(vec![None, Some(ApiError::Response { status: 500, body: String::new() })]);
    let cal = scenario_calibration();
    let mut editor = editing(&node("n", 1, 500.0, 300.0, &[], 0), &cal);
    editor.move_to(Point::new(60.0, 40.0)).unwrap();

    match editor.save(&api, &cal).await {
        Err(EditError::WriteFailed { stage, compensation, .. }) => {
            assert_eq!(stage, WriteStage::Rotation);
            assert_eq!(compensation, Compensation::Restored(vec![WriteStage::Coordinates]));
        }
        other => panic!("expected write failure, got {other:?}"),
    }
    assert_eq!(
        api.recorded_writes(),
        vec![
            Write::Coordinates { tiles_id: "n".into(), x: 290.0, y: 180.0 },
            Write::Coordinates { tiles_id: "n".into(), x: 500.0, y: 300.0 },
        ]
    );
    assert!(editor.session().is_some());
}

#[tokio::test]
async fn failed_revert_is_reported_incomplete() {
    let api = FakeApi::new();
    api.fail_next_writes(vec![
        None,
        None,
        Some(ApiError::Request("name".into())),
        None,
        Some(ApiError::Request("revert coords".into())),
    ]);
    let cal = calibration(1);
    let mut editor = editing(&node("n", 1, 100.0, 100.0, &[], 0), &cal);
    editor.set_name("Lobby").unwrap();

    match editor.save(&api, &cal).await {
        Err(EditError::WriteFailed { stage, compensation, .. }) => {
            assert_eq!(stage, WriteStage::Name);
            assert_eq!(compensation, Compensation::Incomplete(vec![WriteStage::Coordinates]));
        }
        other => panic!("expected write failure, got {other:?}"),
    }
}
