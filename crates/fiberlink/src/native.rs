//! FFI-backed fibers and upcall trampolines.
//!
//! [`NativeContext`] owns a VM context, [`NativeScript`] is a [`NativeFiber`]
//! over one compiled script. The VM's upcall slots are process-wide, so
//! [`install_upcalls`] points them at a single bridge.

use std::ffi::CStr;
use std::os::raw::{c_char, c_int};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::slice;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use fiberlink_sys::*;
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::bridge::{Bridge, BridgeShared};
use crate::error::{BridgeError, BridgeResult};
use crate::fiber::{NativeFiber, NativeResult, NativeValue, ScriptId};

/// Bridge that receives upcalls. Weak so installing never keeps a bridge alive.
static UPCALL_TARGET: Mutex<Weak<BridgeShared>> = Mutex::new(Weak::new());

/// Route the VM's command and error upcalls to `bridge`, replacing any
/// previously installed bridge.
pub fn install_upcalls(bridge: &Bridge) {
    *UPCALL_TARGET.lock() = Arc::downgrade(bridge.shared());
    // SAFETY: both trampolines match the callback signatures and never unwind.
    unsafe { fl_set_callbacks(Some(on_command_called), Some(on_error_called)) };
    debug!("Upcalls installed");
}

/// Detach the VM's upcalls from any bridge.
pub fn uninstall_upcalls() {
    // SAFETY: clearing the slots is always valid.
    unsafe { fl_set_callbacks(None, None) };
    *UPCALL_TARGET.lock() = Weak::new();
    debug!("Upcalls uninstalled");
}

fn upcall_target() -> Option<Arc<BridgeShared>> {
    UPCALL_TARGET.lock().upgrade()
}

unsafe extern "C" fn on_command_called(script_id: c_int, name: FlNString, payload: FlValue) {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let Some(bridge) = upcall_target() else {
            warn!(script_id, "Command upcall with no bridge installed");
            return;
        };
        // SAFETY: the VM keeps the name alive for the duration of the upcall.
        let name = unsafe { name_bytes(&name) };
        bridge.on_command(ScriptId(script_id), name, NativeValue::from_raw(payload));
    }));
    if outcome.is_err() {
        error!(script_id, "Panic in command upcall");
    }
}

unsafe extern "C" fn on_error_called(script_id: c_int, inspection: *const c_char) {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let Some(bridge) = upcall_target() else {
            warn!(script_id, "Error upcall with no bridge installed");
            return;
        };
        // SAFETY: the VM passes a NUL-terminated string or null.
        let description = unsafe { describe(inspection) };
        bridge.on_error(ScriptId(script_id), &description);
    }));
    if outcome.is_err() {
        error!(script_id, "Panic in error upcall");
    }
}

/// # Safety
/// `name.bytes` must be null or valid for `name.length` bytes.
unsafe fn name_bytes<'a>(name: &FlNString) -> &'a [u8] {
    if name.bytes.is_null() || name.length <= 0 {
        return &[];
    }
    unsafe { slice::from_raw_parts(name.bytes, name.length as usize) }
}

/// # Safety
/// `inspection` must be null or point to a NUL-terminated string.
unsafe fn describe(inspection: *const c_char) -> String {
    if inspection.is_null() {
        return "unknown error".to_string();
    }
    unsafe { CStr::from_ptr(inspection) }
        .to_string_lossy()
        .into_owned()
}

/// A VM context. Scripts compiled in it keep it alive.
pub struct NativeContext {
    ctx: FlContextRef,
}

// SAFETY: the VM context is only touched through fl_* calls, and the bridge
// serializes native calls per script.
unsafe impl Send for NativeContext {}
unsafe impl Sync for NativeContext {}

impl NativeContext {
    pub fn new() -> BridgeResult<Arc<Self>> {
        // SAFETY: no preconditions.
        let ctx = unsafe { fl_context_new() };
        if ctx.is_null() {
            return Err(BridgeError::script_execution(
                "fl_context_new returned null",
            ));
        }
        Ok(Arc::new(Self { ctx }))
    }

    /// Compile `source` into a script ready to register with a bridge.
    pub fn compile(self: &Arc<Self>, source: &str) -> BridgeResult<NativeScript> {
        // SAFETY: ctx is live and the source buffer outlives the call.
        let script = unsafe { fl_script_compile(self.ctx, source.as_ptr(), source.len()) };
        if script.is_null() {
            return Err(BridgeError::script_execution("failed to compile script"));
        }
        // SAFETY: non-null scripts start with their id.
        let id = ScriptId(unsafe { (*script).id });
        debug!(script_id = %id, "Script compiled");

        Ok(NativeScript {
            context: self.clone(),
            script,
            id,
            disposed: AtomicBool::new(false),
        })
    }
}

impl Drop for NativeContext {
    fn drop(&mut self) {
        // SAFETY: ctx came from fl_context_new and every script holding it is gone.
        unsafe { fl_context_dispose(self.ctx) };
    }
}

/// One compiled script.
pub struct NativeScript {
    context: Arc<NativeContext>,
    script: FlScriptRef,
    id: ScriptId,
    disposed: AtomicBool,
}

// SAFETY: see NativeContext.
unsafe impl Send for NativeScript {}
unsafe impl Sync for NativeScript {}

impl NativeFiber for NativeScript {
    fn id(&self) -> ScriptId {
        self.id
    }

    fn start(&self) -> NativeResult {
        // SAFETY: the script is live until dispose.
        NativeResult::from_code(unsafe { fl_script_start(self.context.ctx, self.script) })
    }

    fn resume(&self) -> NativeResult {
        // SAFETY: as above.
        NativeResult::from_code(unsafe { fl_script_resume(self.context.ctx, self.script) })
    }

    fn status(&self) -> c_int {
        // SAFETY: as above.
        unsafe { fl_script_status(self.context.ctx, self.script) }
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        // SAFETY: first and only release of this script.
        unsafe { fl_script_dispose(self.context.ctx, self.script) };
    }
}

impl Drop for NativeScript {
    fn drop(&mut self) {
        self.dispose();
    }
}
