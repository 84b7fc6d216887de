//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::os::raw::c_int;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};

use fiberlink::{
    BridgeError, CodecError, ErrorHandler, LogHandler, NativeFiber, NativeResult, NativeValue,
    ScriptId, ScriptRef, ValueCodec,
};
use fiberlink_sys::{
    FL_FIBER_CREATED, FL_FIBER_RUNNING, FL_FIBER_SUSPENDED, FL_FIBER_TERMINATED, FlValue,
};
use parking_lot::Mutex;

/// Which native entry point a hook runs inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Start,
    Resume(usize),
}

type Hook = Box<dyn Fn(Call) + Send + Sync>;

/// Counters shared with a [`ScriptedFiber`] after it is moved into a handle.
#[derive(Debug, Clone, Default)]
pub struct FiberCounters {
    pub starts: Arc<AtomicUsize>,
    pub resumes: Arc<AtomicUsize>,
    pub disposes: Arc<AtomicUsize>,
    state: Arc<AtomicI32>,
}

impl FiberCounters {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn resumes(&self) -> usize {
        self.resumes.load(Ordering::SeqCst)
    }

    pub fn disposes(&self) -> usize {
        self.disposes.load(Ordering::SeqCst)
    }

    /// Force the raw native state, e.g. to an out-of-range ordinal.
    pub fn set_state(&self, state: c_int) {
        self.state.store(state, Ordering::SeqCst);
    }
}

/// In-process fiber that plays back queued results.
///
/// Start and every resume pop the next result (`Continue` once the queue is
/// empty) before running. An optional hook runs inside the native call, where
/// a real VM would issue upcalls. When the hook makes a nested native call,
/// the innermost call's final state is the one the fiber reports.
pub struct ScriptedFiber {
    id: ScriptId,
    results: Mutex<VecDeque<NativeResult>>,
    hook: Option<Hook>,
    steps: AtomicUsize,
    counters: FiberCounters,
}

impl ScriptedFiber {
    pub fn new(id: c_int) -> Self {
        let counters = FiberCounters::default();
        counters.set_state(FL_FIBER_CREATED);
        Self {
            id: ScriptId(id),
            results: Mutex::new(VecDeque::new()),
            hook: None,
            steps: AtomicUsize::new(0),
            counters,
        }
    }

    pub fn results(self, results: impl IntoIterator<Item = NativeResult>) -> Self {
        self.results.lock().extend(results);
        self
    }

    pub fn hook(mut self, hook: impl Fn(Call) + Send + Sync + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn counters(&self) -> FiberCounters {
        self.counters.clone()
    }

    fn step(&self, call: Call) -> NativeResult {
        let result = self
            .results
            .lock()
            .pop_front()
            .unwrap_or(NativeResult::Continue);
        let ticket = self.steps.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.set_state(FL_FIBER_RUNNING);
        if let Some(hook) = &self.hook {
            hook(call);
        }
        // A nested call from the hook already left the final state.
        if self.steps.load(Ordering::SeqCst) == ticket {
            let state = match result {
                NativeResult::Continue => FL_FIBER_SUSPENDED,
                NativeResult::Error | NativeResult::Done => FL_FIBER_TERMINATED,
            };
            self.counters.set_state(state);
        }
        result
    }
}

impl NativeFiber for ScriptedFiber {
    fn id(&self) -> ScriptId {
        self.id
    }

    fn start(&self) -> NativeResult {
        self.counters.starts.fetch_add(1, Ordering::SeqCst);
        self.step(Call::Start)
    }

    fn resume(&self) -> NativeResult {
        let n = self.counters.resumes.fetch_add(1, Ordering::SeqCst) + 1;
        self.step(Call::Resume(n))
    }

    fn status(&self) -> c_int {
        self.counters.state.load(Ordering::SeqCst)
    }

    fn dispose(&self) {
        self.counters.disposes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Codec over a table of JSON values addressed by the payload word.
#[derive(Clone, Default)]
pub struct SlotCodec {
    slots: Arc<Mutex<HashMap<usize, serde_json::Value>>>,
}

impl SlotCodec {
    pub fn put(&self, value: serde_json::Value) -> NativeValue<'static> {
        let mut slots = self.slots.lock();
        let word = slots.len() + 1;
        slots.insert(word, value);
        NativeValue::from_raw(FlValue { word })
    }

    /// Payload with no slot behind it.
    pub fn dangling(&self) -> NativeValue<'static> {
        NativeValue::from_raw(FlValue { word: usize::MAX })
    }
}

impl ValueCodec for SlotCodec {
    fn decode(
        &self,
        value: NativeValue<'_>,
        _script: &ScriptRef,
    ) -> Result<serde_json::Value, CodecError> {
        self.slots
            .lock()
            .get(&value.raw().word)
            .cloned()
            .ok_or_else(|| CodecError::Unsupported(format!("{value:?}")))
    }
}

/// Log and error handlers that record what they receive.
#[derive(Clone, Default)]
pub struct Recorder {
    pub logs: Arc<Mutex<Vec<String>>>,
    pub errors: Arc<Mutex<Vec<BridgeError>>>,
}

impl Recorder {
    pub fn log_handler(&self) -> LogHandler {
        let logs = self.logs.clone();
        Arc::new(move |message: &str| logs.lock().push(message.to_string()))
    }

    pub fn error_handler(&self) -> ErrorHandler {
        let errors = self.errors.clone();
        Arc::new(move |error| errors.lock().push(error))
    }

    pub fn logs(&self) -> Vec<String> {
        self.logs.lock().clone()
    }

    pub fn errors(&self) -> Vec<BridgeError> {
        self.errors.lock().clone()
    }
}
