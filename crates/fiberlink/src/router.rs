//! Host command routing.
//!
//! Any upcall that is not a system command is handed to a [`CommandRouter`].
//! The router returns a future; the bridge drives it on tokio, detached from
//! the upcall, and resumes or fails the script when it completes.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use tracing::{Instrument, debug, debug_span, warn};

use crate::bridge::BridgeShared;
use crate::codec::{ValueCodec, deserialize};
use crate::error::{BridgeError, BridgeResult};
use crate::fiber::NativeValue;
use crate::handle::ScriptRef;

/// Future produced by a router for one command.
pub type CommandFuture = BoxFuture<'static, anyhow::Result<()>>;

/// One forwarded command, valid for the duration of the upcall.
///
/// The payload borrows VM memory. Decode it inside [`CommandRouter::route`]
/// and move owned values into the returned future.
pub struct CommandInvocation<'a> {
    script: &'a ScriptRef,
    name: &'a str,
    payload: NativeValue<'a>,
    codec: &'a dyn ValueCodec,
}

impl<'a> CommandInvocation<'a> {
    pub(crate) fn new(
        script: &'a ScriptRef,
        name: &'a str,
        payload: NativeValue<'a>,
        codec: &'a dyn ValueCodec,
    ) -> Self {
        Self {
            script,
            name,
            payload,
            codec,
        }
    }

    pub fn script(&self) -> &'a ScriptRef {
        self.script
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn payload(&self) -> NativeValue<'a> {
        self.payload
    }

    /// Decode the payload with the bridge's codec.
    pub fn decode<T: DeserializeOwned>(&self) -> BridgeResult<T> {
        deserialize(self.codec, self.name, self.payload, self.script)
    }
}

pub trait CommandRouter: Send + Sync + 'static {
    fn route(&self, invocation: CommandInvocation<'_>) -> CommandFuture;
}

impl<F> CommandRouter for F
where
    F: for<'a> Fn(CommandInvocation<'a>) -> CommandFuture + Send + Sync + 'static,
{
    fn route(&self, invocation: CommandInvocation<'_>) -> CommandFuture {
        self(invocation)
    }
}

/// Hand `name` to the router and drive the resulting future on tokio.
///
/// Never blocks and never unwinds into the caller. Success resumes the script
/// when configured; failure is reported and fails the pending run.
pub(crate) fn forward(
    bridge: &BridgeShared,
    router: &dyn CommandRouter,
    script: &ScriptRef,
    name: &str,
    payload: NativeValue<'_>,
) {
    let Some(runtime) = bridge.runtime() else {
        let error = BridgeError::not_supported(name, "no tokio runtime available");
        script.fail(error.clone());
        return bridge.report(error);
    };

    let invocation = CommandInvocation::new(script, name, payload, &*bridge.codec);
    let future = match std::panic::catch_unwind(AssertUnwindSafe(|| router.route(invocation))) {
        Ok(future) => future,
        Err(panic) => {
            let error = forwarded_error(name, &panic_message(&*panic));
            script.fail(error.clone());
            return bridge.report(error);
        }
    };

    let script = script.clone();
    let command = name.to_string();
    let handlers = bridge.handlers.clone();
    let resume = bridge.config.resume_after_forward;
    let span = debug_span!("forward", script_id = %script.id(), command = %command);

    runtime.spawn(
        async move {
            let outcome = match AssertUnwindSafe(future).catch_unwind().await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(format!("{e:#}")),
                Err(panic) => Err(panic_message(&*panic)),
            };

            match outcome {
                Ok(()) => {
                    debug!("Forwarded command completed");
                    if resume {
                        if let Err(e) = script.resume() {
                            handlers.error(e);
                        }
                    }
                }
                Err(message) => {
                    warn!(error = %message, "Forwarded command failed");
                    let error = forwarded_error(&command, &message);
                    script.fail(error.clone());
                    handlers.error(error);
                }
            }
        }
        .instrument(span),
    );
}

fn forwarded_error(command: &str, message: &str) -> BridgeError {
    BridgeError::ForwardedHandler {
        command: command.to_string(),
        message: message.to_string(),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("handler panicked: {s}")
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_variants() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*boxed), "handler panicked: boom");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*boxed), "handler panicked: bang");

        let boxed: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(&*boxed), "handler panicked");
    }

    #[test]
    fn test_forwarded_error_shape() {
        let err = forwarded_error("spawn_enemy", "no such prefab");
        assert_eq!(err.kind(), "ForwardedHandler");
        assert_eq!(err.to_string(), "Command `spawn_enemy` failed: no such prefab");
    }
}
