//! Codec configuration.

/// How the [`crate::handler::Registry`] should treat an OID it has no
/// handler for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownTypePolicy {
    /// Fall back to the text-only unrecognized handler.
    #[default]
    ReturnAsText,
    /// Treat an unresolvable OID as a bind-time error.
    Fail,
}

/// Tunables for the bind writer and array codec.
///
/// Mirrors the connection-options struct's doc-comment style, but is scoped
/// to the codec's own knobs rather than connection parameters (host, auth,
/// TLS, ... belong to the transport layer this crate does not implement).
#[derive(Debug, Clone)]
pub struct Config {
    /// Capacity, in bytes, of each [`crate::buffer::ByteBuffer`] the driver
    /// loop hands to the writer/reader. Must be large enough to hold the
    /// largest header a client will emit in one atomic step (portal name +
    /// statement name + format-code block), or [`crate::error::Error::BufferTooSmall`]
    /// is raised at the first write. Default: 8192 (8 KiB).
    pub buffer_capacity: usize,

    /// What to do when no handler matches a requested OID. Default:
    /// [`UnknownTypePolicy::ReturnAsText`].
    pub unknown_type_policy: UnknownTypePolicy,

    /// When true, portal and statement names are validated as 7-bit ASCII
    /// with no embedded NUL before encoding. When false, names are trusted
    /// as already-validated UTF-8 and only the embedded-NUL check runs
    /// (NUL is illegal in a C-string regardless of this flag). Default:
    /// true.
    pub strict_ascii_identifiers: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            buffer_capacity: 8192,
            unknown_type_policy: UnknownTypePolicy::ReturnAsText,
            strict_ascii_identifiers: true,
        }
    }
}

impl Config {
    /// Validate a portal/statement identifier per [`Config::strict_ascii_identifiers`].
    pub fn validate_identifier(&self, name: &str) -> crate::error::Result<()> {
        if name.contains('\0') {
            return Err(crate::error::Error::InvalidIdentifier(format!(
                "identifier {name:?} contains an embedded NUL"
            )));
        }
        if self.strict_ascii_identifiers && !name.is_ascii() {
            return Err(crate::error::Error::InvalidIdentifier(format!(
                "identifier {name:?} is not 7-bit ASCII"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_capacity_is_8kib() {
        assert_eq!(Config::default().buffer_capacity, 8192);
    }

    #[test]
    fn rejects_embedded_nul() {
        let cfg = Config::default();
        assert!(cfg.validate_identifier("bad\0name").is_err());
    }

    #[test]
    fn strict_mode_rejects_non_ascii() {
        let cfg = Config::default();
        assert!(cfg.validate_identifier("café").is_err());
    }

    #[test]
    fn lax_mode_allows_non_ascii() {
        let mut cfg = Config::default();
        cfg.strict_ascii_identifiers = false;
        assert!(cfg.validate_identifier("café").is_ok());
    }
}
