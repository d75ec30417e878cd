//! OID-keyed handler lookup.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::UnknownTypePolicy;
use crate::error::{Error, Result};
use crate::protocol::types::Oid;

use super::{ChunkingReader, ChunkingWriter, SimpleReader, SimpleWriter, Value};

/// One entry in the [`Registry`]: a type's identity plus whichever
/// capability traits it implements. A concrete handler (e.g. the int4
/// handler) typically fills in `simple_writer` and `simple_reader` with
/// `Arc`s pointing at the same underlying value, cast to each trait object
/// in turn.
#[derive(Clone)]
pub struct RegisteredHandler {
    pub oid: Oid,
    pub pg_type_name: &'static str,
    pub simple_writer: Option<Arc<dyn SimpleWriter>>,
    pub chunking_writer: Option<Arc<dyn ChunkingWriter>>,
    pub simple_reader: Option<Arc<dyn SimpleReader>>,
    pub chunking_reader: Option<Arc<dyn ChunkingReader>>,
}

impl RegisteredHandler {
    pub fn can_write_binary(&self) -> bool {
        self.simple_writer.is_some() || self.chunking_writer.is_some()
    }

    pub fn can_read_binary(&self) -> bool {
        self.simple_reader.is_some() || self.chunking_reader.is_some()
    }

    /// Binary length `value` will occupy, trying the simple writer then
    /// the chunking writer.
    pub fn validate_and_get_length(&self, value: &Value) -> Result<i32> {
        if let Some(writer) = &self.simple_writer {
            return writer.validate_and_get_length(value);
        }
        if let Some(writer) = &self.chunking_writer {
            return writer.validate_and_get_length(value);
        }
        Err(Error::UnsupportedBinaryFormat { oid: self.oid })
    }
}

/// Maps PostgreSQL OIDs (and, secondarily, type names and host types) to
/// [`RegisteredHandler`]s.
pub struct Registry {
    by_oid: HashMap<Oid, Arc<RegisteredHandler>>,
    by_name: HashMap<&'static str, Arc<RegisteredHandler>>,
    unrecognized: Arc<RegisteredHandler>,
    policy: UnknownTypePolicy,
}

impl Registry {
    /// An empty registry backed only by the unrecognized fallback handler.
    pub fn new(policy: UnknownTypePolicy) -> Self {
        Self {
            by_oid: HashMap::new(),
            by_name: HashMap::new(),
            unrecognized: Arc::new(super::unrecognized::handler()),
            policy,
        }
    }

    /// Registry pre-populated with the representative primitive handlers
    /// (bool, int2, int4, int8, float4, float8, text, varchar, bytea).
    pub fn with_defaults(policy: UnknownTypePolicy) -> Self {
        let mut registry = Self::new(policy);
        for handler in super::primitives::handlers() {
            registry.register(handler);
        }
        registry.register(super::text::handler());
        registry.register(super::text::varchar_handler());
        registry.register(super::bytea::handler());
        registry
    }

    pub fn register(&mut self, handler: RegisteredHandler) {
        let handler = Arc::new(handler);
        self.by_oid.insert(handler.oid, Arc::clone(&handler));
        self.by_name.insert(handler.pg_type_name, handler);
    }

    /// Default OID a bare host type resolves to absent a more specific
    /// declared PG type or DB-type hint. Keyed by the same strings
    /// [`crate::handler::value_type_name`] returns.
    fn default_oid_for_host_type(host_type: &str) -> Option<Oid> {
        use crate::protocol::types::oid;
        Some(match host_type {
            "bool" => oid::BOOL,
            "i16" => oid::INT2,
            "i32" => oid::INT4,
            "i64" => oid::INT8,
            "f32" => oid::FLOAT4,
            "f64" => oid::FLOAT8,
            "String" => oid::TEXT,
            "Vec<u8>" => oid::BYTEA,
            _ => return None,
        })
    }

    /// Maps a backend-declared array OID (e.g. `1007` for `int4[]`) to the
    /// OID of its element type, for the handful of array types this crate
    /// ships scalar handlers for. Unknown array OIDs return `None`; callers
    /// fall back to [`Self::lookup_by_oid`]'s `UnknownTypePolicy` handling.
    pub fn array_element_oid(array_oid: Oid) -> Option<Oid> {
        use crate::protocol::types::oid;
        Some(match array_oid {
            oid::BOOL_ARRAY => oid::BOOL,
            oid::BYTEA_ARRAY => oid::BYTEA,
            oid::INT2_ARRAY => oid::INT2,
            oid::INT4_ARRAY => oid::INT4,
            oid::INT8_ARRAY => oid::INT8,
            oid::FLOAT4_ARRAY => oid::FLOAT4,
            oid::FLOAT8_ARRAY => oid::FLOAT8,
            oid::TEXT_ARRAY => oid::TEXT,
            oid::VARCHAR_ARRAY => oid::VARCHAR,
            _ => return None,
        })
    }

    /// Look up a handler by OID, applying [`UnknownTypePolicy`] on a miss.
    /// Returns an owned `Arc` so the caller (e.g. a [`crate::parameter::Parameter`]
    /// or [`crate::array::ArrayWriter`]) can hold the handler across a
    /// suspended, multi-call operation without borrowing the registry.
    pub fn lookup_by_oid(&self, oid: Oid) -> Result<Arc<RegisteredHandler>> {
        match self.by_oid.get(&oid) {
            Some(handler) => Ok(Arc::clone(handler)),
            None => {
                tracing::debug!(oid, policy = ?self.policy, "no handler registered for oid");
                match self.policy {
                    UnknownTypePolicy::ReturnAsText => Ok(Arc::clone(&self.unrecognized)),
                    UnknownTypePolicy::Fail => Err(Error::InvalidCast {
                        host_type: "<unknown>",
                        oid: Some(oid),
                    }),
                }
            }
        }
    }

    /// Look up a handler by its PostgreSQL type name (e.g. `"int4"`),
    /// applying [`UnknownTypePolicy`] on a miss, same as [`Self::lookup_by_oid`].
    pub fn lookup_by_pg_name(&self, name: &str) -> Result<Arc<RegisteredHandler>> {
        match self.by_name.get(name) {
            Some(handler) => Ok(Arc::clone(handler)),
            None => {
                tracing::debug!(name, policy = ?self.policy, "no handler registered for pg type name");
                match self.policy {
                    UnknownTypePolicy::ReturnAsText => Ok(Arc::clone(&self.unrecognized)),
                    UnknownTypePolicy::Fail => Err(Error::InvalidCast {
                        host_type: "<unknown>",
                        oid: None,
                    }),
                }
            }
        }
    }

    /// Resolve a handler for one bind parameter under the declared-PG-type
    /// / DB-type-hint / host-type precedence: an explicit `db_type_hint`
    /// OID wins outright; otherwise fall back to the default OID for
    /// `host_type`'s Rust type name (applying [`UnknownTypePolicy`] if even
    /// that has no mapping).
    pub fn lookup_for_parameter(
        &self,
        host_type: &'static str,
        db_type_hint: Option<Oid>,
    ) -> Result<Arc<RegisteredHandler>> {
        if let Some(oid) = db_type_hint {
            return self.lookup_by_oid(oid);
        }
        match Self::default_oid_for_host_type(host_type) {
            Some(oid) => self.lookup_by_oid(oid),
            None => {
                tracing::debug!(host_type, policy = ?self.policy, "no default oid for host type");
                match self.policy {
                    UnknownTypePolicy::ReturnAsText => Ok(Arc::clone(&self.unrecognized)),
                    UnknownTypePolicy::Fail => Err(Error::InvalidCast {
                        host_type,
                        oid: None,
                    }),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_oid_resolves_to_its_handler() {
        let registry = Registry::with_defaults(UnknownTypePolicy::ReturnAsText);
        let handler = registry.lookup_by_oid(crate::protocol::types::oid::INT4).unwrap();
        assert_eq!(handler.pg_type_name, "int4");
    }

    #[test]
    fn unknown_oid_falls_back_to_text_by_default() {
        let registry = Registry::with_defaults(UnknownTypePolicy::ReturnAsText);
        let handler = registry.lookup_by_oid(999_999).unwrap();
        assert_eq!(handler.pg_type_name, "unrecognized");
        assert!(!handler.can_read_binary());
    }

    #[test]
    fn unknown_oid_fails_under_strict_policy() {
        let registry = Registry::with_defaults(UnknownTypePolicy::Fail);
        assert!(registry.lookup_by_oid(999_999).is_err());
    }

    #[test]
    fn validate_and_get_length_forwards_to_simple_writer() {
        let registry = Registry::with_defaults(UnknownTypePolicy::Fail);
        let handler = registry.lookup_by_oid(crate::protocol::types::oid::INT4).unwrap();
        assert_eq!(handler.validate_and_get_length(&Value::I32(7)).unwrap(), 4);
    }

    #[test]
    fn validate_and_get_length_fails_without_a_writer() {
        let registry = Registry::with_defaults(UnknownTypePolicy::ReturnAsText);
        let handler = registry.lookup_by_oid(999_999).unwrap();
        assert!(handler.validate_and_get_length(&Value::I32(7)).is_err());
    }

    #[test]
    fn known_name_resolves_to_its_handler() {
        let registry = Registry::with_defaults(UnknownTypePolicy::Fail);
        let handler = registry.lookup_by_pg_name("int4").unwrap();
        assert_eq!(handler.oid, crate::protocol::types::oid::INT4);
    }

    #[test]
    fn unknown_name_fails_under_strict_policy() {
        let registry = Registry::with_defaults(UnknownTypePolicy::Fail);
        assert!(registry.lookup_by_pg_name("no_such_type").is_err());
    }

    #[test]
    fn db_type_hint_wins_over_host_type() {
        let registry = Registry::with_defaults(UnknownTypePolicy::Fail);
        // host type "i32" would default to int4; the hint picks int8 instead.
        let handler = registry
            .lookup_for_parameter("i32", Some(crate::protocol::types::oid::INT8))
            .unwrap();
        assert_eq!(handler.pg_type_name, "int8");
    }

    #[test]
    fn host_type_used_when_no_hint_given() {
        let registry = Registry::with_defaults(UnknownTypePolicy::Fail);
        let handler = registry.lookup_for_parameter("String", None).unwrap();
        assert_eq!(handler.pg_type_name, "text");
    }

    #[test]
    fn unmapped_host_type_without_hint_fails_under_strict_policy() {
        let registry = Registry::with_defaults(UnknownTypePolicy::Fail);
        assert!(registry.lookup_for_parameter("Array", None).is_err());
    }
}
