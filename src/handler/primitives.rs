//! Simple (fixed-size, single-shot) handlers for the fixed-width scalar
//! types: bool, int2, int4, int8, float4, float8.

use crate::error::{Error, Result};
use crate::protocol::types::{Oid, oid};

use super::{Handler, RegisteredHandler, SimpleReader, SimpleWriter, Value};
use super::value_type_name;

macro_rules! scalar_handler {
    ($handler:ident, $oid:expr, $pg_name:literal, $variant:ident, $ty:ty, $len:literal) => {
        pub struct $handler;

        impl Handler for $handler {
            fn oid(&self) -> Oid {
                $oid
            }

            fn pg_type_name(&self) -> &'static str {
                $pg_name
            }

            fn supports_binary_write(&self) -> bool {
                true
            }

            fn supports_binary_read(&self) -> bool {
                true
            }

            fn validate_and_get_length(&self, value: &Value) -> Result<i32> {
                match value {
                    Value::$variant(_) => Ok($len),
                    other => Err(Error::InvalidCast {
                        host_type: value_type_name(other),
                        oid: Some($oid),
                    }),
                }
            }
        }

        impl SimpleWriter for $handler {
            fn write(&self, value: &Value, out: &mut [u8]) -> Result<()> {
                match value {
                    Value::$variant(v) => {
                        out.copy_from_slice(&v.to_be_bytes());
                        Ok(())
                    }
                    other => Err(Error::InvalidCast {
                        host_type: value_type_name(other),
                        oid: Some($oid),
                    }),
                }
            }
        }

        impl SimpleReader for $handler {
            fn read(&self, bytes: &[u8]) -> Result<Value> {
                let array: [u8; $len] = bytes.try_into().map_err(|_| {
                    Error::ProtocolError(format!(
                        "{}: expected {} bytes, got {}",
                        $pg_name,
                        $len,
                        bytes.len()
                    ))
                })?;
                Ok(Value::$variant(<$ty>::from_be_bytes(array)))
            }
        }
    };
}

scalar_handler!(Int2Handler, oid::INT2, "int2", I16, i16, 2);
scalar_handler!(Int4Handler, oid::INT4, "int4", I32, i32, 4);
scalar_handler!(Int8Handler, oid::INT8, "int8", I64, i64, 8);
scalar_handler!(Float4Handler, oid::FLOAT4, "float4", F32, f32, 4);
scalar_handler!(Float8Handler, oid::FLOAT8, "float8", F64, f64, 8);

pub struct BoolHandler;

impl Handler for BoolHandler {
    fn oid(&self) -> Oid {
        oid::BOOL
    }

    fn pg_type_name(&self) -> &'static str {
        "bool"
    }

    fn supports_binary_write(&self) -> bool {
        true
    }

    fn supports_binary_read(&self) -> bool {
        true
    }

    fn validate_and_get_length(&self, value: &Value) -> Result<i32> {
        match value {
            Value::Bool(_) => Ok(1),
            other => Err(Error::InvalidCast {
                host_type: value_type_name(other),
                oid: Some(oid::BOOL),
            }),
        }
    }
}

impl SimpleWriter for BoolHandler {
    fn write(&self, value: &Value, out: &mut [u8]) -> Result<()> {
        match value {
            Value::Bool(v) => {
                out[0] = u8::from(*v);
                Ok(())
            }
            other => Err(Error::InvalidCast {
                host_type: value_type_name(other),
                oid: Some(oid::BOOL),
            }),
        }
    }
}

impl SimpleReader for BoolHandler {
    fn read(&self, bytes: &[u8]) -> Result<Value> {
        match bytes {
            [b] => Ok(Value::Bool(*b != 0)),
            _ => Err(Error::ProtocolError(format!(
                "bool: expected 1 byte, got {}",
                bytes.len()
            ))),
        }
    }
}

fn registered<H>(handler: H, oid: Oid, pg_type_name: &'static str) -> RegisteredHandler
where
    H: Handler + SimpleWriter + SimpleReader + 'static,
{
    let handler = std::sync::Arc::new(handler);
    RegisteredHandler {
        oid,
        pg_type_name,
        simple_writer: Some(handler.clone()),
        chunking_writer: None,
        simple_reader: Some(handler),
        chunking_reader: None,
    }
}

/// The representative fixed-width scalar handlers shipped by default.
pub fn handlers() -> Vec<RegisteredHandler> {
    vec![
        registered(BoolHandler, oid::BOOL, "bool"),
        registered(Int2Handler, oid::INT2, "int2"),
        registered(Int4Handler, oid::INT4, "int4"),
        registered(Int8Handler, oid::INT8, "int8"),
        registered(Float4Handler, oid::FLOAT4, "float4"),
        registered(Float8Handler, oid::FLOAT8, "float8"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int4_roundtrip() {
        let handler = Int4Handler;
        let mut buf = [0u8; 4];
        handler.write(&Value::I32(-7), &mut buf).unwrap();
        assert_eq!(buf, (-7i32).to_be_bytes());
        assert_eq!(handler.read(&buf).unwrap(), Value::I32(-7));
    }

    #[test]
    fn bool_roundtrip() {
        let handler = BoolHandler;
        let mut buf = [0u8; 1];
        handler.write(&Value::Bool(true), &mut buf).unwrap();
        assert_eq!(buf, [1]);
        assert_eq!(handler.read(&buf).unwrap(), Value::Bool(true));
    }

    #[test]
    fn type_mismatch_is_invalid_cast() {
        let handler = Int4Handler;
        let err = handler.validate_and_get_length(&Value::Bool(true)).unwrap_err();
        assert!(matches!(err, Error::InvalidCast { .. }));
    }
}
