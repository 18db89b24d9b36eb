//! Accumulation of REST response bodies

use bytes::{Bytes, BytesMut};
use serde::de::DeserializeOwned;

/// Growable body buffer owned by exactly one REST call
///
/// Chunks are appended as they arrive off the wire; the buffer is dropped when the call
/// that created it returns.
#[derive(Debug, Default)]
pub struct ResponseBuffer {
    data: BytesMut,
}

impl ResponseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
        }
    }

    pub fn extend_from_slice(&mut self, chunk: &[u8]) {
        self.data.extend_from_slice(chunk);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Body as text, with invalid UTF-8 replaced
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }

    pub fn decode_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.data)
    }

    pub fn freeze(self) -> Bytes {
        self.data.freeze()
    }
}
