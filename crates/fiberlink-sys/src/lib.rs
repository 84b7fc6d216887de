//! Raw FFI bindings to the fiberlink script VM C API
//!
//! This crate provides low-level unsafe bindings to the native fiber VM.
//! Use the safe wrappers in `fiberlink` for higher-level access.
//!
//! Linking is opt-in: enable the `link` feature and point
//! `FIBERLINK_VM_LIB_DIR` at the directory holding the native library.

#![allow(non_camel_case_types)]

use std::os::raw::{c_char, c_int};

/// Opaque VM state shared by every script compiled in it.
#[repr(C)]
pub struct FlContextCore {
    _private: [u8; 0],
}

/// Native script instance. Only the leading id is part of the public layout.
#[repr(C)]
pub struct FlScriptCore {
    pub id: c_int,
    _private: [u8; 0],
}

pub type FlContextRef = *mut FlContextCore;
pub type FlScriptRef = *mut FlScriptCore;

/// A boxed VM value (word boxing: one machine word per value).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FlValue {
    pub word: usize,
}

/// Non-owning UTF-8 byte string passed by the VM to upcalls.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct FlNString {
    pub bytes: *const u8,
    pub length: c_int,
}

// Results of fl_script_start / fl_script_resume
pub type FlResult = c_int;
pub const FL_RESULT_ERROR: FlResult = 0;
pub const FL_RESULT_CONTINUE: FlResult = 1;
pub const FL_RESULT_DONE: FlResult = 2;

// Fiber states reported by fl_script_status
pub type FlFiberState = c_int;
pub const FL_FIBER_CREATED: FlFiberState = 0;
pub const FL_FIBER_RUNNING: FlFiberState = 1;
pub const FL_FIBER_RESUMED: FlFiberState = 2;
pub const FL_FIBER_SUSPENDED: FlFiberState = 3;
pub const FL_FIBER_TRANSFERRED: FlFiberState = 4;
pub const FL_FIBER_TERMINATED: FlFiberState = 5;

// Upcall slots
pub type FlCommandCallback =
    Option<unsafe extern "C" fn(script_id: c_int, name: FlNString, payload: FlValue)>;
pub type FlErrorCallback =
    Option<unsafe extern "C" fn(script_id: c_int, inspection: *const c_char)>;

// FFI declarations - linking is handled by build.rs behind the `link` feature
unsafe extern "C" {
    // Context functions
    pub fn fl_context_new() -> FlContextRef;
    pub fn fl_context_dispose(ctx: FlContextRef);

    // Upcall registration (process-wide)
    pub fn fl_set_callbacks(command: FlCommandCallback, error: FlErrorCallback);

    // Script functions
    pub fn fl_script_compile(ctx: FlContextRef, source: *const u8, length: usize) -> FlScriptRef;
    pub fn fl_script_start(ctx: FlContextRef, script: FlScriptRef) -> FlResult;
    pub fn fl_script_resume(ctx: FlContextRef, script: FlScriptRef) -> FlResult;
    pub fn fl_script_status(ctx: FlContextRef, script: FlScriptRef) -> FlFiberState;
    pub fn fl_script_dispose(ctx: FlContextRef, script: FlScriptRef);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, size_of};

    #[test]
    fn test_value_is_one_word() {
        assert_eq!(size_of::<FlValue>(), size_of::<usize>());
        assert_eq!(align_of::<FlValue>(), align_of::<usize>());
    }

    #[test]
    fn test_script_core_starts_with_id() {
        assert_eq!(size_of::<FlScriptCore>(), size_of::<c_int>());
    }

    #[test]
    fn test_fiber_states_are_contiguous() {
        let states = [
            FL_FIBER_CREATED,
            FL_FIBER_RUNNING,
            FL_FIBER_RESUMED,
            FL_FIBER_SUSPENDED,
            FL_FIBER_TRANSFERRED,
            FL_FIBER_TERMINATED,
        ];
        for (ordinal, state) in states.iter().enumerate() {
            assert_eq!(*state as usize, ordinal);
        }
    }
}
