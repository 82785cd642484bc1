//! Versioned binary encoding of GeoVC revision objects.
//!
//! Every object is encoded as a one-byte type tag followed by a type-specific
//! body. The format version is not part of the encoding; callers pass it to
//! [`ObjectWriter`] and [`ObjectReader`].
//!
//! # Versions
//!
//! - [`FormatVersion::V1`] -- plain trees; delta trees are written in full
//! - [`FormatVersion::V2`] -- tree headers carry a delta level and original
//!   tree id, and every node and bucket is marked literal or placeholder
//!
//! Decoding a V2 delta tree needs the original tree, so [`ObjectReader`]
//! can be given an [`ObjectStore`](geovc_store::ObjectStore) to fetch it from.
//!
//! # Streams
//!
//! [`write_stream`] and [`StreamReader`] handle `[id][object]` record streams
//! with a trailing record count, used by [`dump_store`] and [`restore_store`].

pub mod error;
pub mod format;
pub mod reader;
pub mod stream;
pub mod varint;
pub mod writer;

pub use error::{CodecError, CodecResult};
pub use format::FormatVersion;
pub use reader::ObjectReader;
pub use stream::{dump_store, read_stream, restore_store, write_stream, StreamReader};
pub use varint::{decode_varint, encode_varint};
pub use writer::ObjectWriter;
