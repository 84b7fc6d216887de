//! Single-assignment completion signal for a script run.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{BridgeError, BridgeResult};
use crate::fiber::ScriptId;

/// Future returned by Start; resolves once the run succeeds, fails, or is
/// canceled (`Err(BridgeError::Canceled)`).
#[derive(Debug)]
#[must_use = "a script run does nothing observable unless awaited"]
pub struct ScriptRun {
    id: ScriptId,
    rx: oneshot::Receiver<BridgeResult<()>>,
}

impl ScriptRun {
    pub fn script_id(&self) -> ScriptId {
        self.id
    }
}

impl Future for ScriptRun {
    type Output = BridgeResult<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let id = self.id;
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            // The sender only goes away unsettled when the handle is torn down.
            Poll::Ready(Err(_)) => Poll::Ready(Err(BridgeError::UseAfterDispose(id))),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Settling side of a [`ScriptRun`]. The first settle wins.
#[derive(Debug)]
pub(crate) struct Completion {
    id: ScriptId,
    tx: Option<oneshot::Sender<BridgeResult<()>>>,
}

impl Completion {
    pub(crate) fn new(id: ScriptId) -> (Self, ScriptRun) {
        let (tx, rx) = oneshot::channel();
        (Self { id, tx: Some(tx) }, ScriptRun { id, rx })
    }

    pub(crate) fn is_settled(&self) -> bool {
        self.tx.is_none()
    }

    pub(crate) fn succeed(&mut self) -> bool {
        self.settle(Ok(()))
    }

    pub(crate) fn fail(&mut self, error: BridgeError) -> bool {
        self.settle(Err(error))
    }

    pub(crate) fn cancel(&mut self) -> bool {
        self.settle(Err(BridgeError::Canceled))
    }

    fn settle(&mut self, outcome: BridgeResult<()>) -> bool {
        let Some(tx) = self.tx.take() else {
            return false;
        };

        if let Err(Err(error)) = tx.send(outcome) {
            debug!(script_id = %self.id, error = %error, "Run outcome dropped, nobody awaits the script");
        }
        true
    }
}
