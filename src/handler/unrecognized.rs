//! Fallback handler installed for OIDs the registry has no specific
//! handler for, when [`crate::config::UnknownTypePolicy::ReturnAsText`] is
//! in effect.
//!
//! It only ever deals in text, and refuses binary reads outright — writing
//! a parameter through it fails with [`crate::error::Error::NotImplemented`]
//! at bind time (see [`crate::parameter::Parameter::bind`]), since this
//! crate implements binary-format parameter encoding only.

use super::{Handler, RegisteredHandler, SimpleReader, Value};
use crate::error::{Error, Result};
use crate::protocol::types::{Oid, oid};

pub struct UnrecognizedHandler;

impl Handler for UnrecognizedHandler {
    fn oid(&self) -> Oid {
        oid::UNKNOWN
    }

    fn pg_type_name(&self) -> &'static str {
        "unrecognized"
    }

    fn supports_binary_write(&self) -> bool {
        false
    }

    fn supports_binary_read(&self) -> bool {
        false
    }

    fn validate_and_get_length(&self, value: &Value) -> Result<i32> {
        Err(Error::InvalidCast {
            host_type: super::value_type_name(value),
            oid: None,
        })
    }
}

impl SimpleReader for UnrecognizedHandler {
    fn read(&self, _bytes: &[u8]) -> Result<Value> {
        Err(Error::UnsupportedBinaryFormat { oid: oid::UNKNOWN })
    }
}

pub fn handler() -> RegisteredHandler {
    // Deliberately has no simple_reader/simple_writer entries: the registry
    // bootstrap path (before the real type catalog is known) should
    // observe `can_read_binary() == false` and fall back to text, which
    // this crate's scope does not implement encoding for either — callers
    // hitting this handler get a clear error instead of silently
    // misdecoding bytes.
    RegisteredHandler {
        oid: oid::UNKNOWN,
        pg_type_name: "unrecognized",
        simple_writer: None,
        chunking_writer: None,
        simple_reader: None,
        chunking_reader: None,
    }
}
