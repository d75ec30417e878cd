//! Chunking handler for `bytea`.
//!
//! `bytea` is the one type this crate ships a streaming handler for: it
//! demonstrates both the direct-buffer bypass on write (large blobs are
//! hand off to the transport without copying through the main
//! [`ByteBuffer`]) and the multi-call resumable read loop.

use std::sync::Arc;

use crate::buffer::ByteBuffer;
use crate::error::{Error, Result};
use crate::protocol::types::{Oid, oid};

use super::{
    ChunkingRead, ChunkingReader, ChunkingWrite, ChunkingWriter, Handler, RegisteredHandler, Value,
    value_type_name,
};

/// Payloads at or above this size request the direct-buffer bypass instead
/// of copying through the shared [`ByteBuffer`].
const DIRECT_WRITE_THRESHOLD: usize = 4096;

pub struct ByteaHandler;

impl Handler for ByteaHandler {
    fn oid(&self) -> Oid {
        oid::BYTEA
    }

    fn pg_type_name(&self) -> &'static str {
        "bytea"
    }

    fn supports_binary_write(&self) -> bool {
        true
    }

    fn supports_binary_read(&self) -> bool {
        true
    }

    fn validate_and_get_length(&self, value: &Value) -> Result<i32> {
        match value {
            Value::Bytes(b) => i32::try_from(b.len()).map_err(|_| {
                Error::ProtocolError(format!("bytea value of {} bytes exceeds i32::MAX", b.len()))
            }),
            other => Err(Error::InvalidCast {
                host_type: value_type_name(other),
                oid: Some(oid::BYTEA),
            }),
        }
    }
}

impl ChunkingWriter for ByteaHandler {
    fn prepare_write<'v>(&self, value: &'v Value) -> Result<Box<dyn ChunkingWrite + 'v>> {
        match value {
            Value::Bytes(bytes) => Ok(Box::new(ByteaWrite { remaining: bytes })),
            other => Err(Error::InvalidCast {
                host_type: value_type_name(other),
                oid: Some(oid::BYTEA),
            }),
        }
    }
}

struct ByteaWrite<'v> {
    remaining: &'v [u8],
}

impl<'v> ChunkingWrite for ByteaWrite<'v> {
    fn write<'b>(&mut self, buf: &mut ByteBuffer, direct_buf: &mut Option<&'b [u8]>) -> Result<bool>
    where
        Self: 'b,
    {
        if self.remaining.is_empty() {
            return Ok(true);
        }

        if self.remaining.len() >= DIRECT_WRITE_THRESHOLD {
            *direct_buf = Some(self.remaining);
            self.remaining = &[];
            return Ok(false);
        }

        let space = buf.write_space_left();
        if space == 0 {
            return Ok(false);
        }
        let take = space.min(self.remaining.len());
        let (head, tail) = self.remaining.split_at(take);
        if !buf.put_bytes(head) {
            return Err(Error::ProtocolError(
                "bytea writer: put_bytes failed after space check".into(),
            ));
        }
        self.remaining = tail;
        Ok(self.remaining.is_empty())
    }
}

impl ChunkingReader for ByteaHandler {
    fn prepare_read(&self, declared_len: usize) -> Box<dyn ChunkingRead> {
        Box::new(ByteaRead {
            collected: Vec::with_capacity(declared_len),
            remaining: declared_len,
        })
    }
}

struct ByteaRead {
    collected: Vec<u8>,
    remaining: usize,
}

impl ChunkingRead for ByteaRead {
    fn read(&mut self, buf: &mut ByteBuffer) -> Result<Option<Value>> {
        if self.remaining == 0 {
            return Ok(Some(Value::Bytes(std::mem::take(&mut self.collected))));
        }
        let available = buf.read_bytes_left();
        if available == 0 {
            return Ok(None);
        }
        let take = available.min(self.remaining);
        let Some(bytes) = buf.get_bytes(take) else {
            return Ok(None);
        };
        self.collected.extend_from_slice(bytes);
        self.remaining -= take;
        if self.remaining == 0 {
            Ok(Some(Value::Bytes(std::mem::take(&mut self.collected))))
        } else {
            Ok(None)
        }
    }
}

pub fn handler() -> RegisteredHandler {
    let handler = Arc::new(ByteaHandler);
    RegisteredHandler {
        oid: oid::BYTEA,
        pg_type_name: "bytea",
        simple_writer: None,
        chunking_writer: Some(handler.clone()),
        simple_reader: None,
        chunking_reader: Some(handler),
    }
}
