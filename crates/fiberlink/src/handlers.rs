//! Bridge-wide log and error handlers.
//!
//! Scripts log through the `log` system command, and errors with no pending
//! run to settle end up here. Both handlers default to `tracing` and can be
//! swapped at runtime.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, info};

use crate::error::BridgeError;

pub type LogHandler = Arc<dyn Fn(&str) + Send + Sync + 'static>;
pub type ErrorHandler = Arc<dyn Fn(BridgeError) + Send + Sync + 'static>;

pub(crate) struct Handlers {
    log: Mutex<LogHandler>,
    error: Mutex<ErrorHandler>,
}

impl Handlers {
    pub(crate) fn new(log: Option<LogHandler>, error: Option<ErrorHandler>) -> Self {
        Self {
            log: Mutex::new(log.unwrap_or_else(|| Arc::new(default_log_handler))),
            error: Mutex::new(error.unwrap_or_else(|| Arc::new(default_error_handler))),
        }
    }

    pub(crate) fn set_log(&self, handler: LogHandler) {
        *self.log.lock() = handler;
    }

    pub(crate) fn set_error(&self, handler: ErrorHandler) {
        *self.error.lock() = handler;
    }

    pub(crate) fn log(&self, message: &str) {
        let handler = self.log.lock().clone();
        handler(message);
    }

    pub(crate) fn error(&self, err: BridgeError) {
        let handler = self.error.lock().clone();
        handler(err);
    }
}

fn default_log_handler(message: &str) {
    info!(target: "fiberlink::script", "{}", message);
}

fn default_error_handler(err: BridgeError) {
    match err.script_id() {
        Some(id) => error!(target: "fiberlink", kind = err.kind(), script_id = %id, "{}", err),
        None => error!(target: "fiberlink", kind = err.kind(), "{}", err),
    }
}
