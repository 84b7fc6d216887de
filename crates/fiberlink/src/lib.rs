//! fiberlink - bridge between a cooperative fiber script VM and async Rust.
//!
//! Scripts run as native fibers that suspend on host commands. This crate
//! turns their start/resume transitions into futures, routes the commands
//! they issue to host code, and keeps the native resources alive exactly as
//! long as their owning handle.
//!
//! # Example
//!
//! ```no_run
//! use fiberlink::{Bridge, BridgeError, CodecError, NativeValue, ScriptRef, ValueCodec};
//!
//! struct JsonCodec;
//!
//! impl ValueCodec for JsonCodec {
//!     fn decode(
//!         &self,
//!         _value: NativeValue<'_>,
//!         _script: &ScriptRef,
//!     ) -> Result<serde_json::Value, CodecError> {
//!         Ok(serde_json::Value::Null)
//!     }
//! }
//!
//! # async fn run(fiber: impl fiberlink::NativeFiber) -> Result<(), BridgeError> {
//! let bridge = Bridge::builder().codec(JsonCodec).tokio_timers().build()?;
//! let handle = bridge.register(fiber)?;
//! handle.run()?.await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! ```text
//! host ── start/resume ──→ ScriptHandle ──→ NativeFiber (VM)
//!                                              │ upcall (id, name, payload)
//!                                              ↓
//!                          Bridge ── lookup ──→ ScriptRegistry (weak)
//!                            │
//!             ┌──────────────┴──────────────┐
//!             ↓                             ↓
//!      system commands               CommandRouter
//!   log / wait_secs / wait_frames    (detached tokio task)
//!             │                             │
//!             └──────── resume / fail ──────┘
//!                            ↓
//!                   ScriptRun future settles
//! ```

pub mod bridge;
pub mod codec;
mod completion;
pub mod config;
pub mod error;
pub mod fiber;
pub mod handle;
mod handlers;
#[cfg(feature = "native")]
pub mod native;
pub mod registry;
pub mod router;
pub mod scheduler;
pub mod status;
pub mod system;

pub use bridge::{Bridge, BridgeBuilder};
pub use codec::{CodecError, ValueCodec, deserialize};
pub use completion::ScriptRun;
pub use config::BridgeConfig;
pub use error::{BridgeError, BridgeResult};
pub use fiber::{NativeFiber, NativeResult, NativeValue, ScriptId};
pub use handle::{ScriptHandle, ScriptRef};
pub use handlers::{ErrorHandler, LogHandler};
#[cfg(feature = "native")]
pub use native::{NativeContext, NativeScript, install_upcalls, uninstall_upcalls};
pub use registry::ScriptRegistry;
pub use router::{CommandFuture, CommandInvocation, CommandRouter};
pub use scheduler::{FrameClock, FrameScheduler, Notification, TimerScheduler, TokioTimers};
pub use status::ScriptStatus;

// Re-export for hosts that pass cancellation tokens to `ScriptHandle::start`
pub use tokio_util::sync::CancellationToken;
