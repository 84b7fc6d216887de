//! Seam between the bridge and the native fiber VM.
//!
//! [`NativeFiber`] is the per-script slice of the native ABI. The FFI-backed
//! implementation lives in `native` (feature `native`); tests drive the bridge
//! with in-process fibers.

use std::fmt;
use std::marker::PhantomData;
use std::os::raw::c_int;

use fiberlink_sys::{FL_RESULT_CONTINUE, FL_RESULT_DONE, FL_RESULT_ERROR, FlResult, FlValue};
use tracing::warn;

/// Script id assigned by the native side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScriptId(pub c_int);

impl fmt::Display for ScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<c_int> for ScriptId {
    fn from(id: c_int) -> Self {
        Self(id)
    }
}

/// Three-way result of a native start or resume call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeResult {
    /// The fiber raised an error
    Error,
    /// The fiber yielded and waits to be resumed
    Continue,
    /// The fiber ran to completion
    Done,
}

impl NativeResult {
    /// Decode a native result code. Unknown codes are treated as errors.
    pub fn from_code(code: FlResult) -> Self {
        match code {
            FL_RESULT_ERROR => Self::Error,
            FL_RESULT_CONTINUE => Self::Continue,
            FL_RESULT_DONE => Self::Done,
            other => {
                warn!(code = other, "Unknown native result code");
                Self::Error
            }
        }
    }
}

/// One native fiber resource.
///
/// Methods take `&self` because the VM calls back into the bridge while a
/// start or resume is still on the stack, and that upcall may resume the same
/// fiber. Implementations must tolerate being called from different threads
/// one at a time; the bridge never issues two overlapping calls from
/// different threads for one fiber.
pub trait NativeFiber: Send + Sync + 'static {
    /// Id the native side assigned to this script
    fn id(&self) -> ScriptId;

    /// Start executing the script from the beginning
    fn start(&self) -> NativeResult;

    /// Resume a suspended script
    fn resume(&self) -> NativeResult;

    /// Raw fiber state ordinal
    fn status(&self) -> c_int;

    /// Release the native resource. Called at most once.
    fn dispose(&self);
}

/// Opaque VM value borrowed for the extent of one upcall.
///
/// The lifetime keeps payloads from escaping the upcall; decode them through
/// a [`crate::ValueCodec`] to keep anything.
#[derive(Clone, Copy)]
pub struct NativeValue<'a> {
    raw: FlValue,
    _scope: PhantomData<&'a ()>,
}

impl NativeValue<'_> {
    pub fn from_raw(raw: FlValue) -> Self {
        Self {
            raw,
            _scope: PhantomData,
        }
    }

    pub fn raw(&self) -> FlValue {
        self.raw
    }
}

impl fmt::Debug for NativeValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeValue({:#x})", self.raw.word)
    }
}
