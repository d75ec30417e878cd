//! The extended-query `Bind` message writer.
//!
//! Produces exactly one `Bind` message: `'B'`, a big-endian `i32` length,
//! portal/statement names, a format-code block, the parameter block, and a
//! result-format block. Resumable across [`crate::buffer::ByteBuffer`]
//! suspensions via an explicit [`BindMessageWriter::write`] state machine —
//! grounded on the same header-then-body shape as the old `write_bind`
//! helper, generalized so the length field is computed up front rather
//! than patched in after the fact (a bounded, possibly-flushed-mid-message
//! buffer cannot rewind to patch a placeholder the way a growable `Vec`
//! can).

use crate::array::ArrayWriter;
use crate::buffer::ByteBuffer;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::handler::ChunkingWrite;
use crate::parameter::Parameter;
use crate::protocol::types::FormatCode;

const BIND_TYPE_BYTE: u8 = b'B';

/// What to tell the backend about how result columns will be formatted.
pub enum ResultFormats {
    /// A single format code applies to every result column.
    AllColumns {
        /// `true` asks for the server's native/unknown format.
        unknown: bool,
    },
    /// One format code per result column.
    PerColumn(Vec<bool>),
}

impl ResultFormats {
    fn compressed_codes(&self) -> Vec<i16> {
        match self {
            ResultFormats::AllColumns { unknown } => vec![i16::from(!unknown)],
            ResultFormats::PerColumn(columns) => {
                columns.iter().map(|&unknown| i16::from(!unknown)).collect()
            }
        }
    }
}

/// Compute the parameter format-code list per the backend's
/// all-text/all-binary/mixed compression convention: `0` entries means
/// "all text", `1` means "all binary", otherwise one entry per parameter.
pub(crate) fn format_code_list(params: &[Parameter]) -> Vec<i16> {
    if params.is_empty() {
        return Vec::new();
    }
    let all_binary = params.iter().all(|p| p.format_code == FormatCode::Binary);
    let all_text = params.iter().all(|p| p.format_code == FormatCode::Text);
    if all_binary {
        vec![1]
    } else if all_text {
        vec![0]
    } else {
        params
            .iter()
            .map(|p| p.format_code as i16)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    WroteNothing,
    WroteHeader,
    WritingParameters,
    Done,
}

/// Resumable encoder for one `Bind` message.
pub struct BindMessageWriter<'a> {
    portal: &'a str,
    statement: &'a str,
    params: &'a [Parameter],
    result_formats: &'a ResultFormats,
    format_codes: Vec<i16>,
    header_len: usize,
    message_len: i32,
    state: State,
    param_index: usize,
    wrote_param_len: bool,
    chunking: Option<Box<dyn ChunkingWrite + 'a>>,
    array_writer: Option<ArrayWriter<'a>>,
}

impl<'a> BindMessageWriter<'a> {
    /// Build a writer and precompute the message's framing. Fails fast
    /// (before any byte is written) if the configured buffer capacity
    /// cannot hold the header atomically, or a name fails identifier
    /// validation.
    pub fn new(
        config: &Config,
        portal: &'a str,
        statement: &'a str,
        params: &'a [Parameter],
        result_formats: &'a ResultFormats,
    ) -> Result<Self> {
        config.validate_identifier(portal)?;
        config.validate_identifier(statement)?;

        let format_codes = format_code_list(params);
        let result_codes = result_formats.compressed_codes();

        let header_len = 4 + (portal.len() + 1) + (statement.len() + 1) + 2 + 2 * format_codes.len() + 2;
        if config.buffer_capacity < 1 + header_len {
            return Err(Error::BufferTooSmall {
                capacity: config.buffer_capacity,
                required: 1 + header_len,
            });
        }

        let param_block_len: i64 = params
            .iter()
            .map(|p| 4 + i64::from(p.bound_size.max(0)))
            .sum();
        let result_block_len = 2 + 2 * result_codes.len();

        // header_len counts the length field itself (4) plus portal, statement,
        // and format-code block, up through nParams. The message length field
        // excludes the leading type byte but includes itself, so: subtract the
        // 4 bytes already counted for the length field, add the parameter and
        // result-format blocks, then add back 4 for the length field.
        let total_len: i64 =
            (header_len as i64 - 4) + param_block_len + result_block_len as i64 + 4;
        let message_len = i32::try_from(total_len)
            .map_err(|_| Error::ProtocolError(format!("Bind message of {total_len} bytes exceeds i32::MAX")))?;

        Ok(Self {
            portal,
            statement,
            params,
            result_formats,
            format_codes,
            header_len,
            message_len,
            state: State::WroteNothing,
            param_index: 0,
            wrote_param_len: false,
            chunking: None,
            array_writer: None,
        })
    }

    /// The exact byte length this message will occupy, including the
    /// leading type byte. Stable from construction; useful for callers
    /// that want to size their own framing around it.
    pub fn total_message_len(&self) -> usize {
        1 + self.message_len as usize
    }

    /// Drive the writer against `buf`. Returns `Ok(true)` once the full
    /// message has been emitted. When `direct_buf` is set on return, the
    /// driver loop must flush it to the transport before calling `write`
    /// again (see [`crate::driver`]).
    pub fn write<'b>(
        &mut self,
        buf: &mut ByteBuffer,
        direct_buf: &mut Option<&'b [u8]>,
    ) -> Result<bool>
    where
        'a: 'b,
    {
        if self.state == State::WroteNothing {
            if buf.write_space_left() < 1 + self.header_len {
                tracing::debug!(
                    have = buf.write_space_left(),
                    need = 1 + self.header_len,
                    "Bind header suspended: buffer too full"
                );
                return Ok(false);
            }
            if !buf.put_bytes(&[BIND_TYPE_BYTE]) {
                return Err(Error::ProtocolError("Bind header write failed after space check".into()));
            }
            if !buf.put_i32_be(self.message_len) {
                return Err(Error::ProtocolError("Bind header write failed after space check".into()));
            }
            if !buf.put_cstring(self.portal) || !buf.put_cstring(self.statement) {
                return Err(Error::ProtocolError("Bind header write failed after space check".into()));
            }
            if !buf.put_i16_be(i16::try_from(self.format_codes.len()).unwrap_or(i16::MAX)) {
                return Err(Error::ProtocolError("Bind header write failed after space check".into()));
            }
            for &code in &self.format_codes {
                if !buf.put_i16_be(code) {
                    return Err(Error::ProtocolError("Bind header write failed after space check".into()));
                }
            }
            if !buf.put_i16_be(i16::try_from(self.params.len()).unwrap_or(i16::MAX)) {
                return Err(Error::ProtocolError("Bind header write failed after space check".into()));
            }
            self.state = State::WroteHeader;
        }

        if self.state == State::WroteHeader {
            self.state = State::WritingParameters;
        }

        while self.param_index < self.params.len() {
            if !self.write_one_parameter(buf, direct_buf)? {
                tracing::debug!(param_index = self.param_index, "Bind parameter write suspended");
                return Ok(false);
            }
            self.param_index += 1;
            self.wrote_param_len = false;
        }

        let result_codes = self.result_formats.compressed_codes();
        if buf.write_space_left() < 2 + 2 * result_codes.len() {
            return Ok(false);
        }
        if !buf.put_i16_be(i16::try_from(result_codes.len()).unwrap_or(i16::MAX)) {
            return Err(Error::ProtocolError("Bind result-format write failed after space check".into()));
        }
        for code in result_codes {
            if !buf.put_i16_be(code) {
                return Err(Error::ProtocolError("Bind result-format write failed after space check".into()));
            }
        }

        self.state = State::Done;
        Ok(true)
    }

    fn write_one_parameter<'b>(
        &mut self,
        buf: &mut ByteBuffer,
        direct_buf: &mut Option<&'b [u8]>,
    ) -> Result<bool>
    where
        'a: 'b,
    {
        let param = &self.params[self.param_index];

        if !param.is_input_direction {
            return Err(Error::NotInputParameter {
                index: self.param_index,
            });
        }

        if param.is_null() {
            return Ok(buf.put_i32_be(-1));
        }

        if param.format_code != FormatCode::Binary {
            return Err(Error::NotImplemented("text-format parameter encoding"));
        }

        if let Some(array) = param.as_array() {
            if self.array_writer.is_none() {
                if !self.wrote_param_len {
                    if !buf.put_i32_be(param.bound_size) {
                        return Ok(false);
                    }
                    self.wrote_param_len = true;
                }
                let mut writer = ArrayWriter::new(array, param.handler.clone());
                writer.prepare()?;
                self.array_writer = Some(writer);
            }
            let writer = self.array_writer.as_mut().expect("just installed above");
            let done = writer.write(buf, direct_buf)?;
            if done {
                self.array_writer = None;
            }
            return Ok(done);
        }

        let value = param.value.as_ref().expect("checked is_null above");

        if let Some(simple_writer) = &param.handler.simple_writer {
            // Atomic: length prefix + body must fit together in one window.
            if buf.write_space_left() < 4 + param.bound_size as usize {
                return Ok(false);
            }
            let mut scratch = vec![0u8; param.bound_size as usize];
            simple_writer.write(value, &mut scratch)?;
            if !buf.put_i32_be(param.bound_size) || !buf.put_bytes(&scratch) {
                return Err(Error::ProtocolError("Bind parameter write failed after space check".into()));
            }
            return Ok(true);
        }

        if let Some(chunking_writer) = &param.handler.chunking_writer {
            if self.chunking.is_none() {
                if !self.wrote_param_len {
                    if !buf.put_i32_be(param.bound_size) {
                        return Ok(false);
                    }
                    self.wrote_param_len = true;
                }
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
            oid: param.handler.oid,
        })
    }
}

impl<'a> crate::driver::Resumable<'a> for BindMessageWriter<'a> {
    fn advance<'b>(&mut self, buf: &mut ByteBuffer, direct_buf: &mut Option<&'b [u8]>) -> Result<bool>
    where
        'a: 'b,
    {
        self.write(buf, direct_buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UnknownTypePolicy;
    use crate::handler::{Registry, Value};
    use crate::protocol::types::oid;

    fn registry() -> Registry {
        Registry::with_defaults(UnknownTypePolicy::Fail)
    }

    #[test]
    fn two_int4_params_scenario_matches_expected_bytes() {
        let registry = registry();
        let params = vec![
            Parameter::bind(&registry, oid::INT4, Some(Value::I32(1))).unwrap(),
            Parameter::bind(&registry, oid::INT4, Some(Value::I32(2))).unwrap(),
        ];
        let result_formats = ResultFormats::AllColumns { unknown: false };
        let config = Config::default();
        let mut writer = BindMessageWriter::new(&config, "", "", &params, &result_formats).unwrap();

        let mut buf = ByteBuffer::new(256);
        let mut direct = None;
        assert!(writer.write(&mut buf, &mut direct).unwrap());
        assert!(direct.is_none());

        let mut expected = vec![b'B', 0x00, 0x00, 0x00, 0x20];
        expected.extend_from_slice(&[0x00]); // portal NUL
        expected.extend_from_slice(&[0x00]); // statement NUL
        expected.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]); // nFmt=1, [binary]
        expected.extend_from_slice(&[0x00, 0x02]); // nParams=2
        expected.extend_from_slice(&[0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x01]);
        expected.extend_from_slice(&[0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x02]);
        expected.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]); // nResFmt=1, [known]

        assert_eq!(buf.filled_for_flush(), expected.as_slice());
        assert_eq!(writer.total_message_len(), 1 + 0x20);
    }

    #[test]
    fn null_parameter_emits_four_bytes() {
        let registry = registry();
        let params = vec![Parameter::bind(&registry, oid::INT4, None).unwrap()];
        let result_formats = ResultFormats::AllColumns { unknown: false };
        let config = Config::default();
        let mut writer = BindMessageWriter::new(&config, "", "", &params, &result_formats).unwrap();

        let mut buf = ByteBuffer::new(256);
        let mut direct = None;
        writer.write(&mut buf, &mut direct).unwrap();

        let body = buf.filled_for_flush();
        // type('B')+len(4)+portal NUL+statement NUL+nFmt(2)+codes(2)+nParams(2) = 13 bytes before params
        assert_eq!(&body[13..17], &(-1i32).to_be_bytes());
    }

    #[test]
    fn output_direction_parameter_is_rejected() {
        let registry = registry();
        let mut param = Parameter::bind(&registry, oid::INT4, Some(Value::I32(1))).unwrap();
        param.is_input_direction = false;
        let params = vec![param];
        let result_formats = ResultFormats::AllColumns { unknown: false };
        let config = Config::default();
        let mut writer = BindMessageWriter::new(&config, "", "", &params, &result_formats).unwrap();

        let mut buf = ByteBuffer::new(256);
        let mut direct = None;
        let err = writer.write(&mut buf, &mut direct).unwrap_err();
        assert!(matches!(err, Error::NotInputParameter { index: 0 }));
    }

    #[test]
    fn zero_parameters_unnamed_everything() {
        let registry = registry();
        let params: Vec<Parameter> = Vec::new();
        let result_formats = ResultFormats::AllColumns { unknown: false };
        let config = Config::default();
        let mut writer = BindMessageWriter::new(&config, "", "", &params, &result_formats).unwrap();

        let mut buf = ByteBuffer::new(256);
        let mut direct = None;
        writer.write(&mut buf, &mut direct).unwrap();

        // len(4) + portal(1) + stmt(1) + nFmt(2) + nParams(2) + nResFmt(2) + 1 code(2) = 14
        assert_eq!(writer.total_message_len(), 1 + 14);
    }

    #[test]
    fn format_code_compression_all_binary() {
        let registry = registry();
        let params = vec![
            Parameter::bind(&registry, oid::INT4, Some(Value::I32(1))).unwrap(),
            Parameter::bind(&registry, oid::INT4, Some(Value::I32(2))).unwrap(),
        ];
        assert_eq!(format_code_list(&params), vec![1]);
    }

    #[test]
    fn format_code_compression_mixed_lists_every_code() {
        let registry = registry();
        let mut binary_param = Parameter::bind(&registry, oid::INT4, Some(Value::I32(1))).unwrap();
        binary_param.format_code = FormatCode::Binary;
        let mut text_param = Parameter::bind(&registry, oid::INT4, Some(Value::I32(2))).unwrap();
        text_param.format_code = FormatCode::Text;
        let params = vec![text_param, binary_param];
        assert_eq!(format_code_list(&params), vec![0, 1]);
    }

    #[test]
    fn buffer_smaller_than_header_is_fatal() {
        let registry = registry();
        let params: Vec<Parameter> = Vec::new();
        let result_formats = ResultFormats::AllColumns { unknown: false };
        let mut config = Config::default();
        config.buffer_capacity = 4;
        let err = BindMessageWriter::new(&config, "", "", &params, &result_formats).unwrap_err();
        assert!(matches!(err, Error::BufferTooSmall { .. }));
    }

    #[test]
    fn resumption_under_tiny_buffer_matches_single_shot() {
        let registry = registry();
        let params = vec![
            Parameter::bind(&registry, oid::INT4, Some(Value::I32(1))).unwrap(),
            Parameter::bind(&registry, oid::INT4, Some(Value::I32(2))).unwrap(),
        ];
        let result_formats = ResultFormats::AllColumns { unknown: false };
        let config = Config::default();

        let mut full_buf = ByteBuffer::new(4096);
        let mut writer = BindMessageWriter::new(&config, "", "", &params, &result_formats).unwrap();
        let mut direct = None;
        writer.write(&mut full_buf, &mut direct).unwrap();
        let expected = full_buf.filled_for_flush().to_vec();

        let mut tiny_config = config.clone();
        tiny_config.buffer_capacity = 16;
        let mut tiny = ByteBuffer::new(16);
        let mut writer = BindMessageWriter::new(&tiny_config, "", "", &params, &result_formats).unwrap();
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
