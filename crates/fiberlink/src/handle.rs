//! Script handles: ownership, lifecycle and the completion state machine.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, ReentrantMutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::completion::{Completion, ScriptRun};
use crate::error::{BridgeError, BridgeResult};
use crate::fiber::{NativeFiber, NativeResult, ScriptId};
use crate::registry::ScriptRegistry;
use crate::status::ScriptStatus;

struct RunState {
    completion: Option<Completion>,
    cancellation: CancellationToken,
}

/// Shared state behind a [`ScriptHandle`] and its [`ScriptRef`]s.
pub(crate) struct ScriptCore {
    id: ScriptId,
    fiber: Box<dyn NativeFiber>,
    run: Mutex<RunState>,
    /// Serializes native calls across threads; reentrant so an upcall may
    /// resume the fiber that is calling it.
    native: ReentrantMutex<()>,
    disposed: AtomicBool,
    registry: Arc<ScriptRegistry>,
}

impl ScriptCore {
    pub(crate) fn new(fiber: Box<dyn NativeFiber>, registry: Arc<ScriptRegistry>) -> Arc<Self> {
        Arc::new(Self {
            id: fiber.id(),
            fiber,
            run: Mutex::new(RunState {
                completion: None,
                cancellation: CancellationToken::new(),
            }),
            native: ReentrantMutex::new(()),
            disposed: AtomicBool::new(false),
            registry,
        })
    }

    pub(crate) fn id(&self) -> ScriptId {
        self.id
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Release the native fiber without touching the registry. Used when
    /// registration is refused.
    pub(crate) fn release_unregistered(&self) {
        if !self.disposed.swap(true, Ordering::AcqRel) {
            self.fiber.dispose();
        }
    }

    fn ensure_live(&self) -> BridgeResult<()> {
        if self.is_disposed() {
            return Err(BridgeError::UseAfterDispose(self.id));
        }
        Ok(())
    }

    fn status(&self) -> BridgeResult<ScriptStatus> {
        self.ensure_live()?;
        Ok(ScriptStatus::from_ordinal(self.fiber.status()))
    }

    fn current_status(&self) -> ScriptStatus {
        self.status().unwrap_or(ScriptStatus::Disposed)
    }

    fn start(&self, cancellation: CancellationToken) -> BridgeResult<ScriptRun> {
        let _native = self.native.lock();

        let status = self.status()?;
        if !status.is_startable() {
            return Err(BridgeError::InvalidState {
                id: self.id,
                status,
            });
        }

        let run = {
            let mut state = self.run.lock();
            let (mut completion, run) = Completion::new(self.id);
            if cancellation.is_cancelled() {
                completion.cancel();
            }
            if let Some(mut previous) = state.completion.replace(completion) {
                if previous.cancel() {
                    debug!(script_id = %self.id, "Previous run superseded by restart");
                }
            }
            state.cancellation = cancellation;
            run
        };

        debug!(script_id = %self.id, %status, "Starting script");
        let result = self.fiber.start();
        self.settle_after_native(result, "failed to start script");
        Ok(run)
    }

    fn resume(&self) -> BridgeResult<()> {
        let _native = self.native.lock();
        self.ensure_live()?;

        {
            let mut state = self.run.lock();
            if state.cancellation.is_cancelled() {
                if let Some(completion) = state.completion.as_mut() {
                    if completion.cancel() {
                        debug!(script_id = %self.id, "Run canceled at resume");
                    }
                }
            }
        }

        // The fiber still runs to its next suspension point after a cancel.
        trace!(script_id = %self.id, "Resuming script");
        let result = self.fiber.resume();
        self.settle_after_native(result, "unknown error");
        Ok(())
    }

    fn settle_after_native(&self, result: NativeResult, error_message: &str) {
        let mut state = self.run.lock();
        let canceled = state.cancellation.is_cancelled();
        let Some(completion) = state.completion.as_mut() else {
            return;
        };

        if canceled {
            completion.cancel();
        }

        match result {
            NativeResult::Error => {
                if completion.fail(BridgeError::script_execution(error_message)) {
                    debug!(script_id = %self.id, "Script failed");
                }
            }
            NativeResult::Continue => {
                trace!(script_id = %self.id, "Script suspended");
            }
            NativeResult::Done => {
                if completion.succeed() {
                    debug!(script_id = %self.id, "Script completed");
                }
            }
        }
    }

    pub(crate) fn fail(&self, error: BridgeError) {
        let mut state = self.run.lock();
        match state.completion.as_mut() {
            Some(completion) if !completion.is_settled() => {
                debug!(script_id = %self.id, error = %error, "Failing script run");
                completion.fail(error);
            }
            _ => {
                debug!(script_id = %self.id, error = %error, "No pending run to fail");
            }
        }
    }

    fn dispose(&self) {
        let _native = self.native.lock();
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.fiber.dispose();
        self.registry.remove(self.id, self);

        if let Some(completion) = self.run.lock().completion.as_mut() {
            completion.fail(BridgeError::UseAfterDispose(self.id));
        }
        debug!(script_id = %self.id, "Script disposed");
    }
}

/// Owning handle to one native script.
///
/// Not `Clone`: only the owner may start or dispose the script. Dropping the
/// handle disposes it.
pub struct ScriptHandle {
    core: Arc<ScriptCore>,
}

impl ScriptHandle {
    pub(crate) fn new(core: Arc<ScriptCore>) -> Self {
        Self { core }
    }

    pub fn id(&self) -> ScriptId {
        self.core.id
    }

    /// Current native status. Fails once the handle is disposed.
    pub fn status(&self) -> BridgeResult<ScriptStatus> {
        self.core.status()
    }

    /// Start the script, observing `cancellation` at start and at each resume.
    pub fn start(&self, cancellation: CancellationToken) -> BridgeResult<ScriptRun> {
        self.core.start(cancellation)
    }

    /// Start the script without cancellation.
    pub fn run(&self) -> BridgeResult<ScriptRun> {
        self.start(CancellationToken::new())
    }

    pub fn resume(&self) -> BridgeResult<()> {
        self.core.resume()
    }

    /// Fail the pending run. Ignored once the run has settled.
    pub fn fail(&self, error: BridgeError) {
        self.core.fail(error)
    }

    /// Release the native script. Later calls are no-ops.
    pub fn dispose(&self) {
        self.core.dispose()
    }

    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }

    /// Non-owning reference for code that needs to resume or fail this script.
    pub fn script_ref(&self) -> ScriptRef {
        ScriptRef {
            core: self.core.clone(),
        }
    }
}

impl Drop for ScriptHandle {
    fn drop(&mut self) {
        self.core.dispose();
    }
}

impl fmt::Debug for ScriptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptHandle")
            .field("id", &self.core.id)
            .field("status", &self.core.current_status())
            .finish()
    }
}

/// Cloneable, non-owning view of a registered script.
///
/// Handed to upcalls, routers and timers. It can resume or fail the script
/// but never start or dispose it.
#[derive(Clone)]
pub struct ScriptRef {
    core: Arc<ScriptCore>,
}

impl ScriptRef {
    pub(crate) fn new(core: Arc<ScriptCore>) -> Self {
        Self { core }
    }

    pub fn id(&self) -> ScriptId {
        self.core.id
    }

    pub fn status(&self) -> BridgeResult<ScriptStatus> {
        self.core.status()
    }

    pub fn resume(&self) -> BridgeResult<()> {
        self.core.resume()
    }

    pub fn fail(&self, error: BridgeError) {
        self.core.fail(error)
    }

    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }
}

impl fmt::Debug for ScriptRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptRef")
            .field("id", &self.core.id)
            .field("status", &self.core.current_status())
            .finish()
    }
}
