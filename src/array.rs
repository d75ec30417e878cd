//! Binary array encoding/decoding.
//!
//! Wire layout: `ndim:i32, has_nulls:i32, element_oid:u32`, then per
//! dimension `(length:i32, lower_bound:i32)`, then elements in row-major
//! order, each `length:i32` (`-1` = SQL NULL) followed by `length` raw
//! bytes. Both directions are resumable state machines driven by repeated
//! calls against a fixed-capacity [`crate::buffer::ByteBuffer`]; see
//! [`crate::driver`] for the loop that flushes/refills between calls.

use std::sync::Arc;

use crate::buffer::ByteBuffer;
use crate::error::{Error, Result, SafeReadFailure};
use crate::handler::{ChunkingRead, ChunkingWrite, RegisteredHandler, Value};
use crate::protocol::types::Oid;

/// Host-side representation of a decoded/to-be-encoded array. Lower bounds
/// are not modeled: reads normalize them away and writes always emit 1
/// (see design note in `SPEC_FULL.md` §4.5 and `DESIGN.md`).
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayValue {
    pub element_oid: Oid,
    pub dims: Vec<usize>,
    /// Row-major; `None` marks a SQL NULL element.
    pub elements: Vec<Option<Value>>,
}

impl ArrayValue {
    pub fn element_count(&self) -> usize {
        self.dims.iter().product()
    }

    /// Binary length this array will occupy on the wire, not counting the
    /// parameter/element length prefix that precedes it.
    pub fn validate_and_get_length(&self, element_handler: &RegisteredHandler) -> Result<i32> {
        if self.elements.len() != self.element_count() {
            return Err(Error::ProtocolError(format!(
                "array declares {} elements across dims {:?} but holds {}",
                self.element_count(),
                self.dims,
                self.elements.len()
            )));
        }
        let mut total: i64 = 12 + 8 * self.dims.len() as i64;
        for element in &self.elements {
            total += 4;
            if let Some(value) = element {
                total += i64::from(element_handler.validate_and_get_length(value)?);
            }
        }
        i32::try_from(total)
            .map_err(|_| Error::ProtocolError(format!("array of {total} bytes exceeds i32::MAX")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteState {
    NeedPrepare,
    WroteNothing,
    WritingElements,
    Done,
}

/// Resumable array writer. One instance encodes exactly one [`ArrayValue`].
pub struct ArrayWriter<'v> {
    array: &'v ArrayValue,
    element_handler: Arc<RegisteredHandler>,
    state: WriteState,
    index: usize,
    wrote_element_len: bool,
    chunking: Option<Box<dyn ChunkingWrite + 'v>>,
}

impl<'v> ArrayWriter<'v> {
    pub fn new(array: &'v ArrayValue, element_handler: Arc<RegisteredHandler>) -> Self {
        Self {
            array,
            element_handler,
            state: WriteState::NeedPrepare,
            index: 0,
            wrote_element_len: false,
            chunking: None,
        }
    }

    /// (Re-)arm the writer. Errors if a previous run is mid-flight.
    pub fn prepare(&mut self) -> Result<()> {
        if !matches!(self.state, WriteState::NeedPrepare | WriteState::Done) {
            return Err(Error::ConcurrentOperation);
        }
        self.state = WriteState::WroteNothing;
        self.index = 0;
        self.wrote_element_len = false;
        self.chunking = None;
        Ok(())
    }

    /// Drive the writer against `buf`. Returns `Ok(true)` once the entire
    /// array has been emitted. `direct_buf`, when set on return, must be
    /// flushed by the caller before the writer is re-entered (see
    /// [`crate::driver`]).
    pub fn write<'b>(
        &mut self,
        buf: &mut ByteBuffer,
        direct_buf: &mut Option<&'b [u8]>,
    ) -> Result<bool>
    where
        'v: 'b,
    {
        if self.state == WriteState::WroteNothing {
            let ndim = self.array.dims.len();
            let header_len = 12 + 8 * ndim;
            if buf.write_space_left() < header_len {
                tracing::debug!(
                    have = buf.write_space_left(),
                    need = header_len,
                    "array header write suspended: buffer too full"
                );
                return Ok(false);
            }
            let has_nulls = self.array.elements.iter().any(Option::is_none);
            if !buf.put_i32_be(i32::try_from(ndim).map_err(|_| {
                Error::ProtocolError(format!("array rank {ndim} exceeds i32::MAX"))
            })?) || !buf.put_i32_be(i32::from(has_nulls))
                || !buf.put_i32_be(self.array.element_oid as i32)
            {
                return Err(Error::ProtocolError(
                    "array header write failed after space check".into(),
                ));
            }
            for &len in &self.array.dims {
                let len = i32::try_from(len).map_err(|_| {
                    Error::ProtocolError(format!("array dimension length {len} exceeds i32::MAX"))
                })?;
                if !buf.put_i32_be(len) || !buf.put_i32_be(1) {
                    return Err(Error::ProtocolError(
                        "array dimension write failed after space check".into(),
                    ));
                }
            }
            self.state = WriteState::WritingElements;
        }

        while self.index < self.array.elements.len() {
            if !self.write_one_element(buf, direct_buf)? {
                tracing::debug!(element_index = self.index, "array element write suspended");
                return Ok(false);
            }
            self.index += 1;
            self.wrote_element_len = false;
        }

        self.state = WriteState::Done;
        Ok(true)
    }

    fn write_one_element<'b>(
        &mut self,
        buf: &mut ByteBuffer,
        direct_buf: &mut Option<&'b [u8]>,
    ) -> Result<bool>
    where
        'v: 'b,
    {
        let element = &self.array.elements[self.index];

        let Some(value) = element else {
            return Ok(buf.put_i32_be(-1));
        };

        if let Some(chunking) = &mut self.chunking {
            let done = chunking.write(buf, direct_buf)?;
            if done {
                self.chunking = None;
            }
            return Ok(done);
        }

        if let Some(simple_writer) = &self.element_handler.simple_writer {
            // Atomic: a simple writer's whole body must fit alongside its
            // length prefix in one contiguous window, so there is no
            // mid-element suspension point to track here.
            let len = simple_writer.validate_and_get_length(value)?;
            if buf.write_space_left() < 4 + len as usize {
                return Ok(false);
            }
            let mut scratch = vec![0u8; len as usize];
            simple_writer.write(value, &mut scratch)?;
            if !buf.put_i32_be(len) || !buf.put_bytes(&scratch) {
                return Err(Error::ProtocolError(
                    "array element write failed after space check".into(),
                ));
            }
            return Ok(true);
        }

        if let Some(chunking_writer) = &self.element_handler.chunking_writer {
            if !self.wrote_element_len {
                let len = chunking_writer.validate_and_get_length(value)?;
                if !buf.put_i32_be(len) {
                    return Ok(false);
                }
                self.wrote_element_len = true;
                self.chunking = Some(chunking_writer.prepare_write(value)?);
            }
            let chunking = self.chunking.as_mut().expect("just installed above");
            let done = chunking.write(buf, direct_buf)?;
            if done {
                self.chunking = None;
            }
            return Ok(done);
        }

        Err(Error::UnsupportedBinaryFormat {
            oid: self.element_handler.oid,
        })
    }
}

impl<'v> crate::driver::Resumable<'v> for ArrayWriter<'v> {
    fn advance<'b>(&mut self, buf: &mut ByteBuffer, direct_buf: &mut Option<&'b [u8]>) -> Result<bool>
    where
        'v: 'b,
    {
        self.write(buf, direct_buf)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    NeedPrepare,
    ReadNothing,
    ReadHeader,
    ReadingElements,
    Done,
}

/// Resumable array reader. Produces one owned [`ArrayValue`] per
/// `prepare`/`read*` run.
pub struct ArrayReader {
    element_handler: Arc<RegisteredHandler>,
    state: ReadState,
    ndim: i32,
    dim_lengths: Vec<i32>,
    element_oid: Oid,
    elements: Vec<Option<Value>>,
    index: usize,
    /// `-1` means "length prefix for the current element not yet read".
    element_len: i32,
    chunking: Option<Box<dyn ChunkingRead>>,
    safe_failures: Vec<SafeReadFailure>,
}

impl ArrayReader {
    pub fn new(element_handler: Arc<RegisteredHandler>) -> Self {
        Self {
            element_handler,
            state: ReadState::NeedPrepare,
            ndim: 0,
            dim_lengths: Vec::new(),
            element_oid: 0,
            elements: Vec::new(),
            index: 0,
            element_len: -1,
            chunking: None,
            safe_failures: Vec::new(),
        }
    }

    pub fn prepare(&mut self) -> Result<()> {
        if !matches!(self.state, ReadState::NeedPrepare | ReadState::Done) {
            return Err(Error::ConcurrentOperation);
        }
        self.state = ReadState::ReadNothing;
        self.dim_lengths.clear();
        self.elements.clear();
        self.index = 0;
        self.element_len = -1;
        self.chunking = None;
        self.safe_failures.clear();
        Ok(())
    }

    /// Drive the reader against `buf`. Returns `Ok(None)` while more bytes
    /// are needed, `Ok(Some(array))` on a clean completion, or
    /// `Err(Error::SafeReadError)` if one or more elements failed to
    /// decode semantically (the array is discarded; the connection stays
    /// healthy). Any other `Err` means the connection must be discarded.
    pub fn read(&mut self, buf: &mut ByteBuffer) -> Result<Option<ArrayValue>> {
        if self.state == ReadState::ReadNothing {
            if buf.read_bytes_left() < 12 {
                return Ok(None);
            }
            let ndim = buf.get_i32_be().expect("checked above");
            let _has_nulls = buf.get_i32_be().expect("checked above");
            let element_oid = buf.get_i32_be().expect("checked above") as u32;
            if element_oid != self.element_handler.oid {
                return Err(Error::OidMismatch {
                    expected: self.element_handler.oid,
                    found: element_oid,
                });
            }
            self.ndim = ndim;
            self.element_oid = element_oid;
            self.state = ReadState::ReadHeader;
        }

        if self.state == ReadState::ReadHeader {
            let ndim = self.ndim as usize;
            if buf.read_bytes_left() < ndim * 8 {
                return Ok(None);
            }
            for _ in 0..ndim {
                let len = buf.get_i32_be().expect("checked above");
                let _lower_bound = buf.get_i32_be().expect("checked above");
                self.dim_lengths.push(len);
            }
            if self.ndim == 0 {
                self.state = ReadState::Done;
                return Ok(Some(ArrayValue {
                    element_oid: self.element_oid,
                    dims: Vec::new(),
                    elements: Vec::new(),
                }));
            }
            let total: i64 = self.dim_lengths.iter().map(|&l| i64::from(l)).product();
            self.elements = Vec::with_capacity(total.max(0) as usize);
            self.state = ReadState::ReadingElements;
        }

        let total: i64 = self.dim_lengths.iter().map(|&l| i64::from(l)).product();
        while (self.index as i64) < total {
            match self.read_one_element(buf) {
                Ok(true) => {
                    self.index += 1;
                    self.element_len = -1;
                }
                Ok(false) => return Ok(None),
                Err(Error::SafeReadError(mut failures)) => {
                    for failure in &mut failures {
                        failure.element_index = self.index;
                    }
                    self.safe_failures.append(&mut failures);
                    self.index += 1;
                    self.element_len = -1;
                    self.elements.push(None);
                }
                Err(other) => return Err(other),
            }
        }

        self.state = ReadState::Done;
        if !self.safe_failures.is_empty() {
            return Err(Error::SafeReadError(std::mem::take(&mut self.safe_failures)));
        }
        Ok(Some(ArrayValue {
            element_oid: self.element_oid,
            dims: self.dim_lengths.iter().map(|&l| l as usize).collect(),
            elements: std::mem::take(&mut self.elements),
        }))
    }

    /// Returns `Ok(true)` when this element finished (pushed into
    /// `self.elements`), `Ok(false)` when more bytes are needed, or
    /// `Err(SafeReadError)` when the element's bytes were fully consumed
    /// but invalid (caller folds this into the aggregate and continues).
    fn read_one_element(&mut self, buf: &mut ByteBuffer) -> Result<bool> {
        if self.element_len == -1 && self.chunking.is_none() {
            if buf.read_bytes_left() < 4 {
                return Ok(false);
            }
            let len = buf.get_i32_be().expect("checked above");
            if len == -1 {
                self.elements.push(None);
                return Ok(true);
            }
            self.element_len = len;
        }

        if let Some(simple_reader) = &self.element_handler.simple_reader {
            let len = self.element_len as usize;
            if buf.read_bytes_left() < len {
                return Ok(false);
            }
            let bytes = buf.get_bytes(len).expect("checked above");
            let value = simple_reader.read(bytes)?;
            self.elements.push(Some(value));
            return Ok(true);
        }

        if let Some(chunking_reader) = &self.element_handler.chunking_reader {
            if self.chunking.is_none() {
                self.chunking = Some(chunking_reader.prepare_read(self.element_len as usize));
            }
            let chunking = self.chunking.as_mut().expect("just installed above");
            match chunking.read(buf)? {
                Some(value) => {
                    self.chunking = None;
                    self.elements.push(Some(value));
                    Ok(true)
                }
                None => Ok(false),
            }
        } else {
            Err(Error::UnsupportedBinaryFormat {
                oid: self.element_handler.oid,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UnknownTypePolicy;
    use crate::handler::Registry;
    use crate::protocol::types::oid;

    fn int4_handler() -> Arc<RegisteredHandler> {
        Registry::with_defaults(UnknownTypePolicy::Fail)
            .lookup_by_oid(oid::INT4)
            .unwrap()
    }

    #[test]
    fn one_dimensional_roundtrip() {
        let handler = int4_handler();
        let array = ArrayValue {
            element_oid: oid::INT4,
            dims: vec![3],
            elements: vec![Some(Value::I32(10)), Some(Value::I32(20)), Some(Value::I32(30))],
        };

        let mut buf = ByteBuffer::new(256);
        let mut writer = ArrayWriter::new(&array, handler.clone());
        writer.prepare().unwrap();
        let mut direct = None;
        assert!(writer.write(&mut buf, &mut direct).unwrap());
        assert!(direct.is_none());

        let bytes = buf.filled_for_flush().to_vec();
        assert_eq!(bytes.len(), array.validate_and_get_length(&handler).unwrap() as usize);

        let mut read_buf = ByteBuffer::new(256);
        let n = {
            let slot = read_buf.refill_slot();
            slot[..bytes.len()].copy_from_slice(&bytes);
            bytes.len()
        };
        read_buf.mark_refilled(n);

        let mut reader = ArrayReader::new(handler);
        reader.prepare().unwrap();
        let decoded = reader.read(&mut read_buf).unwrap().unwrap();
        assert_eq!(decoded, array);
    }

    #[test]
    fn two_by_three_row_major_roundtrip() {
        let handler = int4_handler();
        let array = ArrayValue {
            element_oid: oid::INT4,
            dims: vec![2, 3],
            elements: (1..=6).map(|n| Some(Value::I32(n))).collect(),
        };

        let mut buf = ByteBuffer::new(256);
        let mut writer = ArrayWriter::new(&array, handler.clone());
        writer.prepare().unwrap();
        let mut direct = None;
        assert!(writer.write(&mut buf, &mut direct).unwrap());

        let bytes = buf.filled_for_flush().to_vec();
        let mut read_buf = ByteBuffer::new(256);
        let n = {
            let slot = read_buf.refill_slot();
            slot[..bytes.len()].copy_from_slice(&bytes);
            bytes.len()
        };
        read_buf.mark_refilled(n);

        let mut reader = ArrayReader::new(handler);
        reader.prepare().unwrap();
        let decoded = reader.read(&mut read_buf).unwrap().unwrap();
        assert_eq!(decoded, array);
    }

    #[test]
    fn null_element_round_trips() {
        let handler = int4_handler();
        let array = ArrayValue {
            element_oid: oid::INT4,
            dims: vec![2],
            elements: vec![None, Some(Value::I32(7))],
        };

        let mut buf = ByteBuffer::new(64);
        let mut writer = ArrayWriter::new(&array, handler.clone());
        writer.prepare().unwrap();
        let mut direct = None;
        writer.write(&mut buf, &mut direct).unwrap();
        assert_eq!(&buf.filled_for_flush()[12..16], &(-1i32).to_be_bytes());

        let bytes = buf.filled_for_flush().to_vec();
        let mut read_buf = ByteBuffer::new(64);
        let n = {
            let slot = read_buf.refill_slot();
            slot[..bytes.len()].copy_from_slice(&bytes);
            bytes.len()
        };
        read_buf.mark_refilled(n);
        let mut reader = ArrayReader::new(handler);
        reader.prepare().unwrap();
        assert_eq!(reader.read(&mut read_buf).unwrap().unwrap(), array);
    }

    #[test]
    fn zero_dimensional_array_is_empty() {
        let handler = int4_handler();
        let array = ArrayValue {
            element_oid: oid::INT4,
            dims: vec![],
            elements: vec![],
        };
        let mut buf = ByteBuffer::new(32);
        let mut writer = ArrayWriter::new(&array, handler.clone());
        writer.prepare().unwrap();
        let mut direct = None;
        writer.write(&mut buf, &mut direct).unwrap();
        assert_eq!(buf.filled_for_flush().len(), 12);

        let bytes = buf.filled_for_flush().to_vec();
        let mut read_buf = ByteBuffer::new(32);
        let n = {
            let slot = read_buf.refill_slot();
            slot[..bytes.len()].copy_from_slice(&bytes);
            bytes.len()
        };
        read_buf.mark_refilled(n);
        let mut reader = ArrayReader::new(handler);
        reader.prepare().unwrap();
        let decoded = reader.read(&mut read_buf).unwrap().unwrap();
        assert_eq!(decoded.elements.len(), 0);
    }

    #[test]
    fn oid_mismatch_is_broken_error() {
        let handler = int4_handler();
        let mut buf = ByteBuffer::new(32);
        let n = {
            let slot = buf.refill_slot();
            slot[..12].copy_from_slice(&[0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 25]); // oid 25 = text
            12
        };
        buf.mark_refilled(n);
        let mut reader = ArrayReader::new(handler);
        reader.prepare().unwrap();
        let err = reader.read(&mut buf).unwrap_err();
        assert!(matches!(err, Error::OidMismatch { .. }));
        assert!(err.is_broken());
    }

    #[test]
    fn resumption_under_tiny_buffer_matches_single_shot() {
        let handler = int4_handler();
        let array = ArrayValue {
            element_oid: oid::INT4,
            dims: vec![2, 3],
            elements: (1..=6).map(|n| Some(Value::I32(n))).collect(),
        };

        let mut full_buf = ByteBuffer::new(4096);
        let mut writer = ArrayWriter::new(&array, handler.clone());
        writer.prepare().unwrap();
        let mut direct = None;
        writer.write(&mut full_buf, &mut direct).unwrap();
        let expected = full_buf.filled_for_flush().to_vec();

        // Drive the same writer against a tiny buffer, manually flushing
        // whenever it suspends, and confirm the concatenated output matches.
        let mut tiny = ByteBuffer::new(8);
        let mut writer = ArrayWriter::new(&array, handler);
        writer.prepare().unwrap();
        let mut collected = Vec::new();
        loop {
            let mut direct = None;
            let done = writer.write(&mut tiny, &mut direct).unwrap();
            collected.extend_from_slice(tiny.filled_for_flush());
            tiny.mark_flushed();
            if done {
                break;
            }
        }
        assert_eq!(collected, expected);
    }
}
