//! Reserved system commands serviced inside the bridge.
//!
//! `log`, `wait_secs` and `wait_frames` never reach the host router. Names are
//! matched byte-for-byte against strings built once per bridge, so the upcall
//! path does not allocate.

use std::time::Duration;

use tracing::trace;

use crate::bridge::BridgeShared;
use crate::codec::deserialize;
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::fiber::NativeValue;
use crate::handle::ScriptRef;

pub const LOG: &str = "log";
pub const WAIT_SECS: &str = "wait_secs";
pub const WAIT_FRAMES: &str = "wait_frames";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SystemCommand {
    Log,
    WaitSecs,
    WaitFrames,
}

#[derive(Debug)]
pub(crate) struct SystemCommands {
    log: String,
    wait_secs: String,
    wait_frames: String,
}

impl SystemCommands {
    pub(crate) fn new(config: &BridgeConfig) -> Self {
        Self {
            log: config.system_command_name(LOG),
            wait_secs: config.system_command_name(WAIT_SECS),
            wait_frames: config.system_command_name(WAIT_FRAMES),
        }
    }

    pub(crate) fn match_name(&self, name: &[u8]) -> Option<SystemCommand> {
        if name == self.log.as_bytes() {
            Some(SystemCommand::Log)
        } else if name == self.wait_secs.as_bytes() {
            Some(SystemCommand::WaitSecs)
        } else if name == self.wait_frames.as_bytes() {
            Some(SystemCommand::WaitFrames)
        } else {
            None
        }
    }

    fn name(&self, command: SystemCommand) -> &str {
        match command {
            SystemCommand::Log => &self.log,
            SystemCommand::WaitSecs => &self.wait_secs,
            SystemCommand::WaitFrames => &self.wait_frames,
        }
    }
}

/// Run a matched system command. Every failure goes to the error handler;
/// the script is left suspended unless the command resumes it.
pub(crate) fn run(
    bridge: &BridgeShared,
    command: SystemCommand,
    script: &ScriptRef,
    payload: NativeValue<'_>,
) {
    let name = bridge.system.name(command);
    trace!(script_id = %script.id(), command = name, "System command");

    match command {
        SystemCommand::Log => {
            let message: String = match deserialize(&*bridge.codec, name, payload, script) {
                Ok(message) => message,
                Err(e) => return bridge.report(e),
            };
            bridge.handlers.log(&message);
            if let Err(e) = script.resume() {
                bridge.report(e);
            }
        }
        SystemCommand::WaitSecs => {
            let Some(timers) = bridge.timers.as_ref() else {
                return bridge.report(BridgeError::not_supported(
                    name,
                    "no timer scheduler configured",
                ));
            };
            let secs: f64 = match deserialize(&*bridge.codec, name, payload, script) {
                Ok(secs) => secs,
                Err(e) => return bridge.report(e),
            };
            let duration = match Duration::try_from_secs_f64(secs) {
                Ok(duration) => duration,
                Err(e) => {
                    return bridge.report(BridgeError::codec(
                        name,
                        format!("invalid duration {secs}: {e}"),
                    ));
                }
            };
            bridge.resume_when(name, script, timers.schedule_after(duration));
        }
        SystemCommand::WaitFrames => {
            let Some(frames) = bridge.frames.as_ref() else {
                return bridge.report(BridgeError::not_supported(
                    name,
                    "no frame scheduler configured",
                ));
            };
            let count: u32 = match deserialize(&*bridge.codec, name, payload, script) {
                Ok(count) => count,
                Err(e) => return bridge.report(e),
            };
            bridge.resume_when(name, script, frames.schedule_after_frames(count));
        }
    }
}
