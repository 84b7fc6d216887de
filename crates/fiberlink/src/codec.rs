//! Decoding of native payloads into host values.
//!
//! The bridge never looks inside a [`NativeValue`]. A [`ValueCodec`] supplied
//! by the embedding turns it into JSON, and [`deserialize`] layers typed serde
//! decoding on top.

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::error::{BridgeError, BridgeResult};
use crate::fiber::NativeValue;
use crate::handle::ScriptRef;

#[derive(Debug, Error)]
pub enum CodecError {
    /// The native value has no host representation
    #[error("unsupported native value: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub trait ValueCodec: Send + Sync + 'static {
    /// Copy a payload out of the VM. Only valid during the upcall that
    /// produced `value`.
    fn decode(
        &self,
        value: NativeValue<'_>,
        script: &ScriptRef,
    ) -> Result<serde_json::Value, CodecError>;
}

/// Decode `value` into `T`. Failures are attributed to `command`.
pub fn deserialize<T: DeserializeOwned>(
    codec: &dyn ValueCodec,
    command: &str,
    value: NativeValue<'_>,
    script: &ScriptRef,
) -> BridgeResult<T> {
    let json = codec
        .decode(value, script)
        .map_err(|e| BridgeError::codec(command, e.to_string()))?;
    serde_json::from_value(json).map_err(|e| BridgeError::codec(command, e.to_string()))
}
