//! Binary wire-format codec and extended-query binding core for a
//! PostgreSQL client driver.
//!
//! # Scope
//!
//! - **`Bind` message encoding**: [`bind::BindMessageWriter`] serializes a
//!   parameterized extended-query `Bind` message into a bounded, resumable
//!   output buffer.
//! - **Binary array codec**: [`array::ArrayWriter`]/[`array::ArrayReader`]
//!   encode and decode arbitrary-dimensional arrays in PostgreSQL's binary
//!   array representation.
//! - **Shared substrate**: both ride a fixed-capacity, resumable
//!   [`buffer::ByteBuffer`] and a capability-based type-handler registry
//!   ([`handler::Registry`]) driven by [`driver::drive_write`]/[`driver::drive_read`].
//!
//! TCP/TLS transport, connection lifecycle, authentication, result-set
//! materialization, SQL parsing, and connection pooling are out of scope —
//! [`driver::Transport`] is the seam a caller's own connection plugs into.
//!
//! # Example
//!
//! ```no_run
//! use pg_bind_codec::bind::{BindMessageWriter, ResultFormats};
//! use pg_bind_codec::buffer::ByteBuffer;
//! use pg_bind_codec::config::{Config, UnknownTypePolicy};
//! use pg_bind_codec::handler::{Registry, Value};
//! use pg_bind_codec::parameter::Parameter;
//! use pg_bind_codec::protocol::types::oid;
//!
//! # fn main() -> pg_bind_codec::error::Result<()> {
//! let registry = Registry::with_defaults(UnknownTypePolicy::Fail);
//! let params = vec![Parameter::bind(&registry, oid::INT4, Some(Value::I32(42)))?];
//! let result_formats = ResultFormats::AllColumns { unknown: false };
//! let config = Config::default();
//!
//! let mut writer = BindMessageWriter::new(&config, "", "my_statement", &params, &result_formats)?;
//! let mut buf = ByteBuffer::new(config.buffer_capacity);
//! let mut direct = None;
//! writer.write(&mut buf, &mut direct)?;
//! # Ok(())
//! # }
//! ```

pub mod array;
pub mod bind;
pub mod buffer;
pub mod buffer_pool;
pub mod config;
pub mod driver;
pub mod error;
pub mod handler;
pub mod parameter;
pub mod protocol;

pub use bind::{BindMessageWriter, ResultFormats};
pub use buffer::ByteBuffer;
pub use buffer_pool::{BufferPool, PooledBuffer};
pub use config::{Config, UnknownTypePolicy};
pub use driver::{drive_read, drive_write, Transport};
pub use error::{Error, Result};
pub use handler::{Registry, Value};
pub use parameter::Parameter;
