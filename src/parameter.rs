//! Binding a host value to a handler ahead of a `Bind` message.

use std::sync::Arc;

use crate::array::ArrayValue;
use crate::error::{Error, Result};
use crate::handler::{RegisteredHandler, Registry, Value};
use crate::protocol::types::{FormatCode, Oid};

/// One input parameter of a `Bind` message, already resolved to a handler
/// and sized. Immutable once built: [`crate::bind::BindMessageWriter`]
/// only ever reads from it.
pub struct Parameter {
    /// For a scalar parameter, the handler for the value itself. For an
    /// array parameter, the handler for its *element* type — the array's
    /// own wire framing (ndim/has_nulls/element_oid/dims) is produced by
    /// [`crate::array::ArrayWriter`], not by a handler.
    pub handler: Arc<RegisteredHandler>,
    pub value: Option<Value>,
    pub format_code: FormatCode,
    /// `-1` for a null parameter, else the exact binary length.
    pub bound_size: i32,
    /// `true` for an ordinary query/statement parameter. `false` marks an
    /// OUT/INOUT procedure parameter, which `Bind` never carries on the
    /// wire — [`crate::bind::BindMessageWriter`] rejects any parameter with
    /// this set to `false`. `Parameter::bind`/`bind_array` always produce
    /// `true`; a caller modeling a `CALL` with OUT parameters sets this
    /// field to `false` directly before constructing a `Bind` (which will
    /// then reject it, per the parameter's own declared direction).
    pub is_input_direction: bool,
}

impl Parameter {
    /// Resolve `oid` to a handler in `registry`, validate `value` against
    /// it, and cache the binary length.
    ///
    /// `oid` is the backend-declared parameter type. For an array
    /// parameter this is the array's own catalog OID (e.g. `1007` for
    /// `int4[]`), resolved via [`Registry::array_element_oid`] to the
    /// element handler the array codec will drive. This crate implements
    /// binary parameter encoding only: a handler that cannot write binary
    /// yields [`Error::NotImplemented`] rather than silently falling back
    /// to text.
    pub fn bind(registry: &Registry, oid: Oid, value: Option<Value>) -> Result<Self> {
        if let Some(element_oid) = Registry::array_element_oid(oid) {
            return Self::bind_array(registry, element_oid, value);
        }

        // Declared PG type / DB-type hint / host type precedence (SPEC_FULL
        // 4.3): `oid` is both the backend-declared type and this crate's
        // only DB-type hint, so it always wins when present; the host-type
        // fallback only matters for a registry that doesn't know `oid` but
        // does know a default handler for the value's Rust type.
        let handler = match &value {
            Some(v) => registry.lookup_for_parameter(crate::handler::value_type_name(v), Some(oid))?,
            None => registry.lookup_by_oid(oid)?,
        };
        let bound_size = match &value {
            None => -1,
            Some(v) => {
                if !handler.can_write_binary() {
                    return Err(Error::NotImplemented("text-format parameter encoding"));
                }
                handler.validate_and_get_length(v)?
            }
        };

        Ok(Self {
            handler,
            value,
            format_code: FormatCode::Binary,
            bound_size,
            is_input_direction: true,
        })
    }

    fn bind_array(registry: &Registry, element_oid: Oid, value: Option<Value>) -> Result<Self> {
        let handler = registry.lookup_by_oid(element_oid)?;

        let bound_size = match &value {
            None => -1,
            Some(Value::Array(array)) => {
                if array.element_oid != element_oid {
                    return Err(Error::OidMismatch {
                        expected: element_oid,
                        found: array.element_oid,
                    });
                }
                if !handler.can_write_binary() {
                    return Err(Error::NotImplemented("text-format parameter encoding"));
                }
                array.validate_and_get_length(&handler)?
            }
            Some(other) => {
                return Err(Error::InvalidCast {
                    host_type: crate::handler::value_type_name(other),
                    oid: Some(element_oid),
                });
            }
        };

        Ok(Self {
            handler,
            value,
            format_code: FormatCode::Binary,
            bound_size,
            is_input_direction: true,
        })
    }

    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    /// The array payload, if this parameter is bound to one.
    pub fn as_array(&self) -> Option<&ArrayValue> {
        match &self.value {
            Some(Value::Array(array)) => Some(array),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UnknownTypePolicy;
    use crate::protocol::types::oid;

    #[test]
    fn binds_known_scalar() {
        let registry = Registry::with_defaults(UnknownTypePolicy::Fail);
        let param = Parameter::bind(&registry, oid::INT4, Some(Value::I32(42))).unwrap();
        assert_eq!(param.bound_size, 4);
        assert_eq!(param.format_code, FormatCode::Binary);
        assert!(param.is_input_direction);
    }

    #[test]
    fn null_parameter_has_bound_size_negative_one() {
        let registry = Registry::with_defaults(UnknownTypePolicy::Fail);
        let param = Parameter::bind(&registry, oid::INT4, None).unwrap();
        assert_eq!(param.bound_size, -1);
        assert!(param.is_null());
    }

    #[test]
    fn unsupported_handler_is_not_implemented() {
        let registry = Registry::with_defaults(UnknownTypePolicy::ReturnAsText);
        let err = Parameter::bind(&registry, 999_999, Some(Value::Text("x".into()))).unwrap_err();
        assert!(matches!(err, Error::NotImplemented(_)));
    }

    #[test]
    fn unknown_oid_under_fail_policy_is_invalid_cast() {
        let registry = Registry::with_defaults(UnknownTypePolicy::Fail);
        let err = Parameter::bind(&registry, 999_999, Some(Value::Text("x".into()))).unwrap_err();
        assert!(matches!(err, Error::InvalidCast { .. }));
    }

    #[test]
    fn binds_array_parameter_by_array_oid() {
        use crate::array::ArrayValue;

        let registry = Registry::with_defaults(UnknownTypePolicy::Fail);
        let array = ArrayValue {
            element_oid: oid::INT4,
            dims: vec![2],
            elements: vec![Some(Value::I32(1)), Some(Value::I32(2))],
        };
        let param = Parameter::bind(&registry, oid::INT4_ARRAY, Some(Value::Array(array))).unwrap();
        assert_eq!(param.handler.oid, oid::INT4);
        assert_eq!(param.bound_size, 12 + 8 + 2 * 8);
    }
}
