//! Simple handler for the UTF-8 text family (`text`, `varchar`).
//!
//! Binary format for these types is just the raw UTF-8 bytes with no
//! length prefix of its own (the 4-byte parameter/element length prefix
//! written by the caller already carries the byte count).

use crate::error::{Error, Result};
use crate::protocol::types::{Oid, oid};

use super::{Handler, RegisteredHandler, SimpleReader, SimpleWriter, Value};

pub struct TextHandler {
    oid: Oid,
    pg_type_name: &'static str,
}

impl Handler for TextHandler {
    fn oid(&self) -> Oid {
        self.oid
    }

    fn pg_type_name(&self) -> &'static str {
        self.pg_type_name
    }

    fn supports_binary_write(&self) -> bool {
        true
    }

    fn supports_binary_read(&self) -> bool {
        true
    }

    fn validate_and_get_length(&self, value: &Value) -> Result<i32> {
        match value {
            Value::Text(s) => Ok(i32::try_from(s.len()).map_err(|_| Error::ProtocolError(
                format!("text value of {} bytes exceeds i32::MAX", s.len()),
            ))?),
            other => Err(Error::InvalidCast {
                host_type: super::value_type_name(other),
                oid: Some(self.oid),
            }),
        }
    }
}

impl SimpleWriter for TextHandler {
    fn write(&self, value: &Value, out: &mut [u8]) -> Result<()> {
        match value {
            Value::Text(s) => {
                out.copy_from_slice(s.as_bytes());
                Ok(())
            }
            other => Err(Error::InvalidCast {
                host_type: super::value_type_name(other),
                oid: Some(self.oid),
            }),
        }
    }
}

impl SimpleReader for TextHandler {
    fn read(&self, bytes: &[u8]) -> Result<Value> {
        simdutf8::compat::from_utf8(bytes)
            .map(|s| Value::Text(s.to_owned()))
            .map_err(|e| Error::SafeReadError(vec![crate::error::SafeReadFailure {
                element_index: 0,
                message: format!("invalid UTF-8 in {}: {e}", self.pg_type_name),
            }]))
    }
}

fn registered(oid: Oid, pg_type_name: &'static str) -> RegisteredHandler {
    let handler = std::sync::Arc::new(TextHandler { oid, pg_type_name });
    RegisteredHandler {
        oid,
        pg_type_name,
        simple_writer: Some(handler.clone()),
        chunking_writer: None,
        simple_reader: Some(handler),
        chunking_reader: None,
    }
}

/// `text` and `varchar` share one handler implementation; the registry
/// only needs one of them registered under its own OID, so callers wanting
/// both call this twice with the two OIDs.
pub fn handler() -> RegisteredHandler {
    registered(oid::TEXT, "text")
}

/// `varchar`'s handler, identical in behavior to `text`'s.
pub fn varchar_handler() -> RegisteredHandler {
    registered(oid::VARCHAR, "varchar")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_roundtrip() {
        let handler = TextHandler {
            oid: oid::TEXT,
            pg_type_name: "text",
        };
        let value = Value::Text("hello".to_owned());
        let len = handler.validate_and_get_length(&value).unwrap();
        let mut buf = vec![0u8; len as usize];
        handler.write(&value, &mut buf).unwrap();
        assert_eq!(buf, b"hello");
        assert_eq!(handler.read(&buf).unwrap(), value);
    }

    #[test]
    fn invalid_utf8_is_safe_error() {
        let handler = TextHandler {
            oid: oid::TEXT,
            pg_type_name: "text",
        };
        let err = handler.read(&[0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, Error::SafeReadError(_)));
    }
}
