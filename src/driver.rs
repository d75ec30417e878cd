//! Flush/refill driver loop wiring a resumable writer/reader to a transport.
//!
//! Grounded on the old `state::action::Action`-returning step loop: rather
//! than handing an enum back to the caller to act on, the loop here owns
//! the transport directly and re-enters the codec's `write`/`read` method
//! until it reports completion, flushing or refilling the shared
//! [`ByteBuffer`] in between.

use std::io;

use crate::buffer::ByteBuffer;
use crate::error::{Error, Result};

/// Minimal transport seam the driver loop writes to and reads from.
/// Connection setup, TLS negotiation, and authentication are out of scope
/// for this codec; any full-duplex byte stream — a `TcpStream`, a
/// `UnixStream`, an in-memory test double — can serve as one.
pub trait Transport {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl<T: io::Read + io::Write> Transport for T {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        io::Write::write_all(self, buf)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(self, buf)
    }
}

/// A codec writer resumable across buffer suspensions, parameterized by the
/// lifetime of the value(s) it borrows. Implemented by
/// [`crate::bind::BindMessageWriter`] and [`crate::array::ArrayWriter`].
pub trait Resumable<'a> {
    /// Advance the writer. Mirrors the inherent `write` method each
    /// implementor already exposes for direct (non-driven) use.
    fn advance<'b>(&mut self, buf: &mut ByteBuffer, direct_buf: &mut Option<&'b [u8]>) -> Result<bool>
    where
        'a: 'b;
}

/// Drive `writer` to completion against `transport`, using `buf` as the
/// intermediate window. Flushes `buf`'s filled region and any
/// direct-buffer bypass after every suspension, in that order, so byte
/// order on the wire matches what a single unbounded buffer would have
/// produced.
pub fn drive_write<'a, T, W>(transport: &mut T, buf: &mut ByteBuffer, writer: &mut W) -> Result<()>
where
    T: Transport,
    W: Resumable<'a>,
{
    loop {
        let mut direct_buf: Option<&'a [u8]> = None;
        let done = writer.advance(buf, &mut direct_buf)?;

        if !buf.filled_for_flush().is_empty() {
            transport.write_all(buf.filled_for_flush()).map_err(Error::Io)?;
            buf.mark_flushed();
        }

        if let Some(direct) = direct_buf {
            transport.write_all(direct).map_err(Error::Io)?;
        }

        if done {
            return Ok(());
        }
    }
}

/// Drive a resumable read (e.g. [`crate::array::ArrayReader::read`]) to
/// completion against `transport`, refilling `buf` whenever `step` reports
/// it needs more bytes.
pub fn drive_read<T, R>(
    transport: &mut T,
    buf: &mut ByteBuffer,
    mut step: impl FnMut(&mut ByteBuffer) -> Result<Option<R>>,
) -> Result<R>
where
    T: Transport,
{
    loop {
        if let Some(value) = step(buf)? {
            return Ok(value);
        }
        buf.compact();
        if buf.refill_slot().is_empty() {
            return Err(Error::ProtocolError(
                "read buffer exhausted without completing the value".into(),
            ));
        }
        let n = transport.read(buf.refill_slot()).map_err(Error::Io)?;
        if n == 0 {
            return Err(Error::Io(io::Error::from(io::ErrorKind::UnexpectedEof)));
        }
        buf.mark_refilled(n);
    }
}
