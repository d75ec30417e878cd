//! PostgreSQL wire protocol types shared by the bind/array codec.
//!
//! Message parsing/encoding for message kinds this codec does not
//! implement (`Query`, `Parse`, `Startup`, authentication, `COPY`,
//! result-set rows) lives outside this crate's scope; only the common
//! wire types (`FormatCode`, `Oid`, well-known type OIDs) remain here.

pub mod types;

pub use types::{FormatCode, Oid, TransactionStatus};
