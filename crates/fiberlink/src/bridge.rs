//! The bridge: entry point for native upcalls and owner of shared state.
//!
//! The native VM calls back with a script id and either a command or an
//! error description. [`Bridge::on_command`] resolves the id, services system
//! commands in place and forwards everything else to the host router.
//! [`Bridge::on_error`] fails the script's pending run.

use std::fmt;
use std::str;
use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{Instrument, debug, debug_span, trace};

use crate::codec::ValueCodec;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::fiber::{NativeFiber, NativeValue, ScriptId};
use crate::handle::{ScriptHandle, ScriptRef};
use crate::handlers::{ErrorHandler, Handlers, LogHandler};
use crate::registry::ScriptRegistry;
use crate::router::{self, CommandRouter};
use crate::scheduler::{FrameScheduler, Notification, TimerScheduler, TokioTimers};
use crate::system::{self, SystemCommands};

pub(crate) struct BridgeShared {
    pub(crate) registry: Arc<ScriptRegistry>,
    pub(crate) codec: Arc<dyn ValueCodec>,
    pub(crate) router: Option<Arc<dyn CommandRouter>>,
    pub(crate) handlers: Arc<Handlers>,
    pub(crate) timers: Option<Arc<dyn TimerScheduler>>,
    pub(crate) frames: Option<Arc<dyn FrameScheduler>>,
    runtime: Option<Handle>,
    pub(crate) system: SystemCommands,
    pub(crate) config: BridgeConfig,
}

impl BridgeShared {
    /// Configured runtime, else the one driving the current thread.
    pub(crate) fn runtime(&self) -> Option<Handle> {
        self.runtime.clone().or_else(|| Handle::try_current().ok())
    }

    pub(crate) fn report(&self, error: BridgeError) {
        trace!(kind = error.kind(), "Reporting bridge error");
        self.handlers.error(error);
    }

    /// Resume `script` once `notification` fires.
    pub(crate) fn resume_when(&self, command: &str, script: &ScriptRef, notification: Notification) {
        let Some(runtime) = self.runtime() else {
            return self.report(BridgeError::not_supported(
                command,
                "no tokio runtime available",
            ));
        };

        let script = script.clone();
        let handlers = self.handlers.clone();
        let span = debug_span!("wait", script_id = %script.id(), command = %command);
        runtime.spawn(
            async move {
                notification.await;
                trace!("Wait elapsed");
                if let Err(e) = script.resume() {
                    handlers.error(e);
                }
            }
            .instrument(span),
        );
    }

    pub(crate) fn on_command(&self, id: ScriptId, name: &[u8], payload: NativeValue<'_>) {
        let script = match self.registry.lookup(id) {
            Ok(script) => script,
            Err(_) => {
                return self.report(BridgeError::Unrouteable {
                    id,
                    detail: format!("command `{}`", String::from_utf8_lossy(name)),
                });
            }
        };

        if let Some(command) = self.system.match_name(name) {
            return system::run(self, command, &script, payload);
        }

        let name = match str::from_utf8(name) {
            Ok(name) => name,
            Err(e) => {
                let error = BridgeError::codec(
                    String::from_utf8_lossy(name),
                    format!("command name is not UTF-8: {e}"),
                );
                script.fail(error.clone());
                return self.report(error);
            }
        };

        match self.router.as_deref() {
            Some(router) => {
                trace!(script_id = %id, command = name, "Forwarding command");
                router::forward(self, router, &script, name, payload);
            }
            None => {
                let error = BridgeError::not_supported(name, "no command router configured");
                script.fail(error.clone());
                self.report(error);
            }
        }
    }

    pub(crate) fn on_error(&self, id: ScriptId, description: &str) {
        match self.registry.lookup(id) {
            Ok(script) => {
                debug!(script_id = %id, error = description, "Script raised an error");
                script.fail(BridgeError::script_execution(description));
            }
            Err(_) => self.report(BridgeError::Unrouteable {
                id,
                detail: description.to_string(),
            }),
        }
    }
}

/// Cheaply cloneable bridge between native scripts and the host.
#[derive(Clone)]
pub struct Bridge {
    shared: Arc<BridgeShared>,
}

impl Bridge {
    pub fn builder() -> BridgeBuilder {
        BridgeBuilder::default()
    }

    /// Register a native fiber and take ownership of it.
    pub fn register(&self, fiber: impl NativeFiber) -> BridgeResult<ScriptHandle> {
        self.shared.registry.register(Box::new(fiber))
    }

    pub fn registry(&self) -> &Arc<ScriptRegistry> {
        &self.shared.registry
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.shared.config
    }

    /// Command upcall from the VM. Never blocks on host work and never fails
    /// the caller; problems go to the error handler or the script's run.
    pub fn on_command(&self, id: ScriptId, name: &[u8], payload: NativeValue<'_>) {
        self.shared.on_command(id, name, payload);
    }

    /// Error upcall from the VM.
    pub fn on_error(&self, id: ScriptId, description: &str) {
        self.shared.on_error(id, description);
    }

    /// Send an error to the error handler.
    pub fn report(&self, error: BridgeError) {
        self.shared.report(error);
    }

    pub fn set_log_handler(&self, handler: LogHandler) {
        self.shared.handlers.set_log(handler);
    }

    pub fn set_error_handler(&self, handler: ErrorHandler) {
        self.shared.handlers.set_error(handler);
    }

    #[cfg_attr(not(feature = "native"), allow(dead_code))]
    pub(crate) fn shared(&self) -> &Arc<BridgeShared> {
        &self.shared
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("scripts", &self.shared.registry.len())
            .field("router", &self.shared.router.is_some())
            .field("timers", &self.shared.timers.is_some())
            .field("frames", &self.shared.frames.is_some())
            .field("config", &self.shared.config)
            .finish()
    }
}

/// Builder for [`Bridge`]. A codec is required; everything else is optional.
#[derive(Default)]
pub struct BridgeBuilder {
    codec: Option<Arc<dyn ValueCodec>>,
    router: Option<Arc<dyn CommandRouter>>,
    log: Option<LogHandler>,
    error: Option<ErrorHandler>,
    timers: Option<Arc<dyn TimerScheduler>>,
    frames: Option<Arc<dyn FrameScheduler>>,
    runtime: Option<Handle>,
    config: BridgeConfig,
}

impl BridgeBuilder {
    pub fn codec(mut self, codec: impl ValueCodec) -> Self {
        self.codec = Some(Arc::new(codec));
        self
    }

    pub fn router(mut self, router: impl CommandRouter) -> Self {
        self.router = Some(Arc::new(router));
        self
    }

    pub fn log_handler(mut self, handler: LogHandler) -> Self {
        self.log = Some(handler);
        self
    }

    pub fn error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error = Some(handler);
        self
    }

    pub fn timers(mut self, timers: Arc<dyn TimerScheduler>) -> Self {
        self.timers = Some(timers);
        self
    }

    /// Use `tokio::time` for `wait_secs`.
    pub fn tokio_timers(self) -> Self {
        self.timers(Arc::new(TokioTimers))
    }

    pub fn frames(mut self, frames: Arc<dyn FrameScheduler>) -> Self {
        self.frames = Some(frames);
        self
    }

    /// Runtime for detached tasks. Defaults to the runtime current at the
    /// time of each upcall.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> BridgeResult<Bridge> {
        let codec = self
            .codec
            .ok_or_else(|| BridgeError::Config("a value codec is required".to_string()))?;

        let system = SystemCommands::new(&self.config);
        debug!(
            namespace = ?self.config.system_namespace,
            router = self.router.is_some(),
            timers = self.timers.is_some(),
            frames = self.frames.is_some(),
            "Bridge built"
        );

        Ok(Bridge {
            shared: Arc::new(BridgeShared {
                registry: Arc::new(ScriptRegistry::new()),
                codec,
                router: self.router,
                handlers: Arc::new(Handlers::new(self.log, self.error)),
                timers: self.timers,
                frames: self.frames,
                runtime: self.runtime,
                system,
                config: self.config,
            }),
        })
    }
}
