//! Render Core Tests
//!
//! Tests for:
//! - Termination policies (pass count, wall clock)
//! - Final frame hand-off after completion
//! - Graceful and immediate aborts
//! - Restart and stale-frame rejection
//! - Catastrophic backend errors and panics

use std::sync::Arc;
use std::time::Duration;

use prism::errors::{BackendError, RenderFailure};
use prism::render_core::{RenderCore, RenderOutcome, RenderState, RenderTarget, SharedTarget};
use prism::settings::Termination;
use prism::{CancellationToken, FrameSlot};
use prism_dev_utils::{RenderEvent, RenderLog, ScriptedRenderer};

const TIMEOUT: Duration = Duration::from_secs(10);

struct Harness {
    core: RenderCore<ScriptedRenderer>,
    target: SharedTarget<ScriptedRenderer>,
    slot: Arc<FrameSlot>,
    token: CancellationToken,
}

fn harness(renderer: ScriptedRenderer, termination: Termination) -> Harness {
    let target = RenderTarget::shared(renderer);
    target.lock().create_frame_buffers(2, 2).unwrap();
    let slot = Arc::new(FrameSlot::new());
    let token = CancellationToken::new();
    let core = RenderCore::new(
        Arc::clone(&target),
        Arc::clone(&slot),
        token.clone(),
        termination,
        None,
    );
    Harness {
        core,
        target,
        slot,
        token,
    }
}

fn frame_buffer_teardowns(log: &RenderLog) -> usize {
    log.count(RenderEvent::DestroyFrameBuffers)
}

// ============================================================================
// Termination
// ============================================================================

#[test]
fn pass_count_completes_with_the_last_pass_in_the_slot() {
    let (renderer, log) = ScriptedRenderer::new();
    let h = harness(renderer, Termination::pass_count(5));

    let (outcome, progress) = h.core.spawn().unwrap().join();

    assert_eq!(outcome, RenderOutcome::Completed);
    assert_eq!(progress.passes, 5);
    assert_eq!(log.passes(), 5);

    let frame = h.slot.take().expect("final frame");
    assert_eq!(frame.pass, 5);
    assert_eq!(frame.epoch, 0);
    assert!((frame.color[0][0] - 5.0).abs() < 1e-5);
    assert_eq!(frame.color.len(), 4);

    // Buffers stay alive for the session to read
    assert_eq!(frame_buffer_teardowns(&log), 0);
    assert!(h.target.lock().has_frame_buffers());
    assert_eq!(h.target.lock().pass(), 5);
}

#[test]
fn accumulation_is_cleared_before_the_first_pass() {
    let (renderer, log) = ScriptedRenderer::new();
    let h = harness(renderer, Termination::pass_count(1));

    h.core.spawn().unwrap().join();

    let events = log.events();
    let clear = log.position(RenderEvent::ClearFrameBuffers).unwrap();
    let first_pass = log.position(RenderEvent::Pass(1)).unwrap();
    assert!(clear < first_pass);
    assert_eq!(events[0], RenderEvent::CreateFrameBuffers { width: 2, height: 2 });
}

#[test]
fn wall_clock_limit_completes() {
    let (renderer, _log) = ScriptedRenderer::new();
    let renderer = renderer.with_pass_delay(Duration::from_millis(2));
    let h = harness(
        renderer,
        Termination::wall_clock(Duration::from_millis(30)),
    );

    let (outcome, progress) = h.core.spawn().unwrap().join();

    assert!(outcome.is_completed());
    assert!(progress.passes >= 1);
    assert!(progress.elapsed >= Duration::from_millis(30));
}

#[test]
fn finished_loop_reports_done_state() {
    let (renderer, _log) = ScriptedRenderer::new();
    let h = harness(renderer, Termination::pass_count(2));

    let mut thread = h.core.spawn().unwrap();
    assert_eq!(thread.wait(TIMEOUT), Some(RenderOutcome::Completed));
    assert_eq!(thread.state(), RenderState::Done(RenderOutcome::Completed));
    assert_eq!(thread.try_outcome(), Some(RenderOutcome::Completed));
    assert_eq!(thread.progress().passes, 2);
}

// ============================================================================
// Aborts
// ============================================================================

#[test]
fn graceful_abort_finishes_the_pass_in_flight() {
    let (renderer, log) = ScriptedRenderer::new();
    let (renderer, gate) = renderer.gated();
    let h = harness(renderer, Termination::None);

    let thread = h.core.spawn().unwrap();
    assert_eq!(gate.entered.recv_timeout(TIMEOUT), Ok(1));
    h.token.cancel();
    drop(gate.release);

    let (outcome, progress) = thread.join();

    assert_eq!(outcome, RenderOutcome::Aborted);
    assert_eq!(progress.passes, 1);
    assert_eq!(log.passes(), 1);
    // The completed pass is still resolved
    assert_eq!(h.slot.take().map(|f| f.pass), Some(1));
    assert_eq!(frame_buffer_teardowns(&log), 0);
}

#[test]
fn immediate_abort_tears_down_buffers_before_done() {
    let (renderer, log) = ScriptedRenderer::new();
    let (renderer, gate) = renderer.gated();
    let h = harness(renderer, Termination::None);

    let mut thread = h.core.spawn().unwrap();
    assert_eq!(gate.entered.recv_timeout(TIMEOUT), Ok(1));
    h.token.cancel_immediate();
    drop(gate.release);

    // The outcome is only delivered once the loop has fully wound down
    assert_eq!(thread.wait(TIMEOUT), Some(RenderOutcome::Aborted));
    assert_eq!(frame_buffer_teardowns(&log), 1);
    assert!(!log.contains(RenderEvent::ReadAccumulation(1)));
    thread.join();

    assert!(h.slot.take().is_none());
    assert!(!h.target.lock().has_frame_buffers());
}

#[test]
fn abort_before_first_pass_renders_nothing() {
    let (renderer, log) = ScriptedRenderer::new();
    let h = harness(renderer, Termination::None);
    h.token.cancel();

    let (outcome, progress) = h.core.spawn().unwrap().join();

    assert_eq!(outcome, RenderOutcome::Aborted);
    assert_eq!(progress.passes, 0);
    assert_eq!(log.passes(), 0);
    assert!(h.slot.take().is_none());
}

// ============================================================================
// Restart
// ============================================================================

#[test]
fn restart_clears_accumulation_and_bumps_epoch() {
    let (renderer, log) = ScriptedRenderer::new();
    let (renderer, gate) = renderer.gated();
    let h = harness(renderer, Termination::None);

    let thread = h.core.spawn().unwrap();
    assert_eq!(gate.entered.recv_timeout(TIMEOUT), Ok(1));
    h.token.request_restart();
    gate.release.send(()).unwrap();

    // The pass after the restart starts from an empty accumulation again
    assert_eq!(gate.entered.recv_timeout(TIMEOUT), Ok(1));
    assert_eq!(thread.state(), RenderState::Rendering);

    h.token.cancel();
    drop(gate.release);
    let (outcome, progress) = thread.join();

    assert_eq!(outcome, RenderOutcome::Aborted);
    assert_eq!(progress.passes, 1);
    assert_eq!(log.count(RenderEvent::ClearFrameBuffers), 2);
    assert_eq!(h.target.lock().epoch(), 1);

    let frame = h.slot.take().expect("frame after restart");
    assert_eq!(frame.stamp(), (1, 1));
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn backend_error_is_catastrophic() {
    let (renderer, log) = ScriptedRenderer::new();
    let h = harness(renderer.fail_at(3, -9), Termination::pass_count(10));

    let (outcome, progress) = h.core.spawn().unwrap().join();

    assert_eq!(
        outcome,
        RenderOutcome::Catastrophic(RenderFailure::Backend(BackendError::new("render_pass", -9)))
    );
    assert_eq!(progress.passes, 2);
    assert!(log.contains(RenderEvent::PassFailed));
    assert_eq!(h.slot.take().map(|f| f.pass), Some(2));
}

#[test]
fn panic_in_backend_is_caught() {
    let (renderer, _log) = ScriptedRenderer::new();
    let h = harness(renderer.panic_at(2), Termination::pass_count(10));

    let (outcome, progress) = h.core.spawn().unwrap().join();

    assert_eq!(
        outcome,
        RenderOutcome::Catastrophic(RenderFailure::Panicked("scripted panic in pass 2".into()))
    );
    assert_eq!(progress.passes, 1);
    // The target lock survives the panic
    assert_eq!(h.target.lock().pass(), 1);
}
