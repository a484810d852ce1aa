//! Render Session Manager Tests
//!
//! Tests for:
//! - Full session: start, poll, final repaint, teardown order
//! - Cancellation from the UI and shutdown mid-render
//! - Catastrophic failures surfaced through the UI
//! - Precondition and state errors

use std::time::Duration;

use prism::compose::Bitmap;
use prism::frame::Frame;
use prism::settings::{RenderSettings, Termination};
use prism::{FrameCompositor, PrismError, RenderOutcome, RenderSessionManager};
use prism_dev_utils::{HeadlessUi, RenderEvent, RenderLog, ScriptedRenderer};

const TIMEOUT: Duration = Duration::from_secs(10);

fn settings(termination: Termination) -> RenderSettings {
    RenderSettings {
        width: 4,
        height: 2,
        termination,
        ui_poll_ms: 1,
        frame_copy_ms: 1,
        ..Default::default()
    }
}

/// Writes the pass number of the composed frame into the red channel of the
/// first pixel so tests can tell which pass a repaint showed.
fn pass_stamp(bitmap: &mut Bitmap, frame: &Frame) {
    bitmap.set_pixel(0, 0, [frame.pass as u8, 0, 0, 255]);
}

fn manager(termination: Termination) -> RenderSessionManager<ScriptedRenderer> {
    let settings = settings(termination);
    let compositor = FrameCompositor::new(&settings).with_stamp(pass_stamp);
    RenderSessionManager::with_compositor(settings, compositor)
}

fn assert_torn_down_in_order(log: &RenderLog) {
    assert_eq!(log.count(RenderEvent::DestroyFrameBuffers), 1);
    assert_eq!(log.count(RenderEvent::DestroyContext), 1);
    let buffers = log.position(RenderEvent::DestroyFrameBuffers).unwrap();
    let context = log.position(RenderEvent::DestroyContext).unwrap();
    assert!(buffers < context);
    assert_eq!(log.events().last(), Some(&RenderEvent::DestroyContext));
}

// ============================================================================
// Full Session
// ============================================================================

#[test]
fn pass_limited_session_presents_the_last_pass() {
    let (renderer, log) = ScriptedRenderer::new();
    let mut manager = manager(Termination::pass_count(5));
    let mut ui = HeadlessUi::new();

    manager.start(renderer).unwrap();
    assert!(manager.is_active());
    let report = manager.run(&mut ui).unwrap();

    assert_eq!(report.outcome, RenderOutcome::Completed);
    assert_eq!(report.passes, 5);
    assert!(!manager.is_active());

    let last = ui.last_presented().expect("a repaint");
    assert_eq!((last.width, last.height), (4, 2));
    assert_eq!(last.pixel(0, 0).map(|p| p[0]), Some(5));
    assert_eq!(ui.progress.last().map(String::as_str), Some("Pass 5/5"));
    assert!(ui.errors.is_empty());
    assert!(ui.polls >= 1);

    assert_eq!(log.events()[0], RenderEvent::CreateFrameBuffers { width: 4, height: 2 });
    assert_torn_down_in_order(&log);
}

#[test]
fn user_cancel_aborts_the_session() {
    let (renderer, log) = ScriptedRenderer::new();
    let renderer = renderer.with_pass_delay(Duration::from_millis(1));
    let mut manager = manager(Termination::None);
    let mut ui = HeadlessUi::cancelling_after(3);

    manager.start(renderer).unwrap();
    let report = manager.run(&mut ui).unwrap();

    assert_eq!(report.outcome, RenderOutcome::Aborted);
    assert!(ui.polls >= 3);
    assert!(ui.errors.is_empty());
    assert_torn_down_in_order(&log);
}

#[test]
fn backend_failure_is_reported_to_the_user() {
    let (renderer, log) = ScriptedRenderer::new();
    let mut manager = manager(Termination::pass_count(10));
    let mut ui = HeadlessUi::new();

    manager.start(renderer.fail_at(2, -5)).unwrap();
    let report = manager.run(&mut ui).unwrap();

    assert!(matches!(report.outcome, RenderOutcome::Catastrophic(_)));
    assert_eq!(report.passes, 1);
    assert_eq!(ui.errors.len(), 1);
    assert!(ui.errors[0].contains("render_pass"));
    assert!(ui.errors[0].contains("-5"));
    assert_torn_down_in_order(&log);
}

// ============================================================================
// Control
// ============================================================================

#[test]
fn shutdown_mid_render_tears_down_in_order() {
    let (renderer, log) = ScriptedRenderer::new();
    let (renderer, gate) = renderer.gated();
    let mut manager = manager(Termination::None);

    manager.start(renderer).unwrap();
    assert_eq!(gate.entered.recv_timeout(TIMEOUT), Ok(1));
    assert!(manager.frame_slot().is_some());
    drop(gate.release);

    let report = manager.shutdown().unwrap();

    assert_eq!(report.outcome, RenderOutcome::Aborted);
    assert!(report.passes >= 1);
    assert!(!manager.is_active());
    assert_torn_down_in_order(&log);
}

#[test]
fn restart_forwards_to_the_render_loop() {
    let (renderer, log) = ScriptedRenderer::new();
    let (renderer, gate) = renderer.gated();
    let mut manager = manager(Termination::None);

    manager.start(renderer).unwrap();
    assert_eq!(gate.entered.recv_timeout(TIMEOUT), Ok(1));
    manager.restart().unwrap();
    gate.release.send(()).unwrap();
    assert_eq!(gate.entered.recv_timeout(TIMEOUT), Ok(1));

    manager.cancel().unwrap();
    drop(gate.release);
    let report = manager.shutdown().unwrap();

    assert_eq!(report.outcome, RenderOutcome::Aborted);
    assert_eq!(log.count(RenderEvent::ClearFrameBuffers), 2);
}

#[test]
fn dropping_an_active_manager_aborts_immediately() {
    let (renderer, log) = ScriptedRenderer::new();
    let renderer = renderer.with_pass_delay(Duration::from_millis(1));
    let mut manager = manager(Termination::None);

    manager.start(renderer).unwrap();
    drop(manager);

    // Torn down once even though the loop and the session both try
    assert_torn_down_in_order(&log);
}

#[test]
fn manager_can_run_consecutive_sessions() {
    let mut manager = manager(Termination::pass_count(2));

    for _ in 0..2 {
        let (renderer, log) = ScriptedRenderer::new();
        let mut ui = HeadlessUi::new();
        manager.start(renderer).unwrap();
        let report = manager.run(&mut ui).unwrap();
        assert!(report.outcome.is_completed());
        assert_torn_down_in_order(&log);
    }
}

// ============================================================================
// Errors & Preconditions
// ============================================================================

#[test]
#[should_panic(expected = "already active")]
fn second_session_on_one_renderer_panics() {
    let (first, _log) = ScriptedRenderer::new();
    let (second, _log2) = ScriptedRenderer::new();
    let mut manager = manager(Termination::None);

    manager.start(first.with_pass_delay(Duration::from_millis(1))).unwrap();
    let _ = manager.start(second);
}

#[test]
fn invalid_settings_are_rejected_before_any_backend_call() {
    let (renderer, log) = ScriptedRenderer::new();
    let mut manager = RenderSessionManager::new(RenderSettings {
        width: 0,
        ..Default::default()
    });

    let err = manager.start(renderer).unwrap_err();

    assert!(matches!(err, PrismError::InvalidSetting { field: "width/height", .. }));
    assert!(log.events().is_empty());
    assert!(!manager.is_active());
}

#[test]
fn control_without_a_session_fails() {
    let mut manager = manager(Termination::None);
    let mut ui = HeadlessUi::new();

    assert!(matches!(manager.cancel(), Err(PrismError::NoActiveSession)));
    assert!(matches!(manager.cancel_immediate(), Err(PrismError::NoActiveSession)));
    assert!(matches!(manager.restart(), Err(PrismError::NoActiveSession)));
    assert!(matches!(manager.poll(&mut ui), Err(PrismError::NoActiveSession)));
    assert!(matches!(manager.shutdown(), Err(PrismError::NoActiveSession)));
    assert!(manager.progress().is_none());
    assert_eq!(manager.presented_count(), 0);
}
