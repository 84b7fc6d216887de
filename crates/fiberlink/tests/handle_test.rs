//! Integration tests for script handle lifecycle

mod common;

use common::{ScriptedFiber, SlotCodec};
use fiberlink::{Bridge, BridgeError, CancellationToken, NativeResult, ScriptId, ScriptStatus};
use fiberlink_sys::{
    FL_FIBER_RESUMED, FL_FIBER_RUNNING, FL_FIBER_SUSPENDED, FL_FIBER_TERMINATED,
    FL_FIBER_TRANSFERRED,
};
use futures_util::FutureExt;

fn bridge() -> Bridge {
    Bridge::builder().codec(SlotCodec::default()).build().unwrap()
}

#[test]
fn test_repeated_dispose_tears_down_once() {
    let bridge = bridge();
    let fiber = ScriptedFiber::new(1).results([NativeResult::Continue]);
    let counters = fiber.counters();
    let handle = bridge.register(fiber).unwrap();

    let _run = handle.run().unwrap();
    handle.dispose();
    handle.dispose();
    handle.dispose();
    drop(handle);

    assert_eq!(counters.disposes(), 1);
    assert!(bridge.registry().is_empty());
}

#[test]
fn test_start_rejected_while_active() {
    let bridge = bridge();
    for state in [
        FL_FIBER_RUNNING,
        FL_FIBER_RESUMED,
        FL_FIBER_SUSPENDED,
        FL_FIBER_TRANSFERRED,
    ] {
        let fiber = ScriptedFiber::new(state);
        let counters = fiber.counters();
        let handle = bridge.register(fiber).unwrap();
        counters.set_state(state);

        let err = handle.run().unwrap_err();
        assert!(
            matches!(err, BridgeError::InvalidState { id, .. } if id == ScriptId(state)),
            "state {state}: {err:?}"
        );
        assert_eq!(counters.starts(), 0);
    }
}

#[test]
fn test_start_allowed_when_created_or_terminated() {
    let bridge = bridge();
    let fiber = ScriptedFiber::new(1).results([NativeResult::Done, NativeResult::Done]);
    let counters = fiber.counters();
    let handle = bridge.register(fiber).unwrap();

    assert_eq!(handle.status().unwrap(), ScriptStatus::Created);
    assert_eq!(handle.run().unwrap().now_or_never(), Some(Ok(())));

    assert_eq!(handle.status().unwrap(), ScriptStatus::Terminated);
    assert_eq!(handle.run().unwrap().now_or_never(), Some(Ok(())));
    assert_eq!(counters.starts(), 2);
}

#[test]
fn test_continue_then_done_settles_after_resume() {
    let bridge = bridge();
    let fiber = ScriptedFiber::new(1).results([NativeResult::Continue, NativeResult::Done]);
    let counters = fiber.counters();
    let handle = bridge.register(fiber).unwrap();

    let mut run = handle.run().unwrap();
    assert!((&mut run).now_or_never().is_none());
    assert_eq!(handle.status().unwrap(), ScriptStatus::Suspended);

    handle.resume().unwrap();
    assert_eq!(counters.resumes(), 1);
    assert_eq!(run.now_or_never(), Some(Ok(())));

    // A late failure cannot override the settled outcome.
    handle.fail(BridgeError::script_execution("late"));
}

#[test]
fn test_resume_error_uses_generic_message() {
    let bridge = bridge();
    let fiber = ScriptedFiber::new(1).results([NativeResult::Continue, NativeResult::Error]);
    let handle = bridge.register(fiber).unwrap();

    let run = handle.run().unwrap();
    handle.resume().unwrap();
    assert_eq!(
        run.now_or_never(),
        Some(Err(BridgeError::script_execution("unknown error")))
    );
}

#[test]
fn test_start_error_uses_start_message() {
    let bridge = bridge();
    let handle = bridge
        .register(ScriptedFiber::new(1).results([NativeResult::Error]))
        .unwrap();

    assert_eq!(
        handle.run().unwrap().now_or_never(),
        Some(Err(BridgeError::script_execution("failed to start script")))
    );
}

#[test]
fn test_precanceled_start_still_calls_native() {
    let bridge = bridge();
    let fiber = ScriptedFiber::new(1).results([NativeResult::Done]);
    let counters = fiber.counters();
    let handle = bridge.register(fiber).unwrap();

    let token = CancellationToken::new();
    token.cancel();
    let run = handle.start(token).unwrap();

    assert_eq!(counters.starts(), 1);
    assert_eq!(run.now_or_never(), Some(Err(BridgeError::Canceled)));
}

#[test]
fn test_cancel_observed_at_resume() {
    let bridge = bridge();
    let fiber = ScriptedFiber::new(1).results([NativeResult::Continue, NativeResult::Done]);
    let counters = fiber.counters();
    let handle = bridge.register(fiber).unwrap();

    let token = CancellationToken::new();
    let mut run = handle.start(token.clone()).unwrap();
    assert!((&mut run).now_or_never().is_none());

    token.cancel();
    handle.resume().unwrap();

    // The fiber keeps running to completion; the run still reports the cancel.
    assert_eq!(counters.resumes(), 1);
    assert_eq!(handle.status().unwrap(), ScriptStatus::Terminated);
    let outcome = run.now_or_never().unwrap();
    assert!(outcome.unwrap_err().is_canceled());

    // Not parked: the script can be started again.
    let token = CancellationToken::new();
    assert!(handle.start(token).is_ok());
}

#[test]
fn test_cancel_at_resume_keeps_suspended_fiber_resumable() {
    let bridge = bridge();
    let fiber = ScriptedFiber::new(2).results([
        NativeResult::Continue,
        NativeResult::Continue,
        NativeResult::Done,
    ]);
    let counters = fiber.counters();
    let handle = bridge.register(fiber).unwrap();

    let token = CancellationToken::new();
    let run = handle.start(token.clone()).unwrap();
    token.cancel();

    handle.resume().unwrap();
    assert_eq!(handle.status().unwrap(), ScriptStatus::Suspended);
    handle.resume().unwrap();
    assert_eq!(handle.status().unwrap(), ScriptStatus::Terminated);

    assert_eq!(counters.resumes(), 2);
    assert_eq!(run.now_or_never(), Some(Err(BridgeError::Canceled)));
}

#[test]
fn test_dispose_fails_pending_run() {
    let bridge = bridge();
    let handle = bridge.register(ScriptedFiber::new(3)).unwrap();

    let run = handle.run().unwrap();
    handle.dispose();

    assert_eq!(
        run.now_or_never(),
        Some(Err(BridgeError::UseAfterDispose(ScriptId(3))))
    );
    assert_eq!(handle.status(), Err(BridgeError::UseAfterDispose(ScriptId(3))));
    assert_eq!(handle.resume(), Err(BridgeError::UseAfterDispose(ScriptId(3))));
}

#[test]
fn test_drop_disposes() {
    let bridge = bridge();
    let fiber = ScriptedFiber::new(4);
    let counters = fiber.counters();
    let handle = bridge.register(fiber).unwrap();
    let script = handle.script_ref();

    drop(handle);

    assert_eq!(counters.disposes(), 1);
    assert!(script.is_disposed());
    assert!(!bridge.registry().contains(ScriptId(4)));
}

#[test]
fn test_duplicate_id_rejected() {
    let bridge = bridge();
    let _first = bridge.register(ScriptedFiber::new(5)).unwrap();

    let second = ScriptedFiber::new(5);
    let counters = second.counters();
    assert_eq!(
        bridge.register(second).unwrap_err(),
        BridgeError::DuplicateScript(ScriptId(5))
    );
    assert_eq!(counters.disposes(), 1);
}

#[test]
fn test_out_of_range_ordinal_is_terminated() {
    let bridge = bridge();
    let fiber = ScriptedFiber::new(6);
    let counters = fiber.counters();
    let handle = bridge.register(fiber).unwrap();

    counters.set_state(FL_FIBER_TERMINATED + 3);
    assert_eq!(handle.status().unwrap(), ScriptStatus::Terminated);
    counters.set_state(-1);
    assert_eq!(handle.status().unwrap(), ScriptStatus::Terminated);
}

#[tokio::test]
async fn test_resume_from_another_thread() {
    let bridge = bridge();
    let fiber = ScriptedFiber::new(7).results([NativeResult::Continue, NativeResult::Done]);
    let handle = bridge.register(fiber).unwrap();

    let run = handle.run().unwrap();
    let script = handle.script_ref();
    std::thread::spawn(move || script.resume().unwrap())
        .join()
        .unwrap();

    assert_eq!(run.await, Ok(()));
}
