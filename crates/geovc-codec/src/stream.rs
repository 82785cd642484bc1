//! Object streams: `[20-byte id][encoded object]` records followed by an
//! 8-byte big-endian record count.
//!
//! Streams carry no length prefixes, so a reader knows it has reached the
//! trailer when exactly 8 bytes remain. No record is that short.

use std::collections::HashMap;
use std::io::{Read, Write};

use geovc_store::{ObjectStore, RevObject, RevTree};
use geovc_types::{ObjectId, NUM_BYTES};
use tracing::debug;

use crate::error::{CodecError, CodecResult};
use crate::format::FormatVersion;
use crate::reader::{Decoder, ObjectReader};
use crate::writer::ObjectWriter;

const TRAILER_LEN: usize = 8;

/// Write `objects` as a stream. Returns the number of records written.
///
/// A delta tree must come after its original, or the original must already
/// be in the store the stream is read against.
pub fn write_stream<'o, W, I>(out: &mut W, objects: I, version: FormatVersion) -> CodecResult<u64>
where
    W: Write,
    I: IntoIterator<Item = &'o RevObject>,
{
    let writer = ObjectWriter::new(version);
    let mut count = 0u64;
    let mut buf = Vec::new();
    for object in objects {
        buf.clear();
        buf.extend_from_slice(object.id().as_bytes());
        writer.encode_into(&mut buf, object);
        out.write_all(&buf)?;
        count += 1;
    }
    out.write_all(&count.to_be_bytes())?;
    out.flush()?;
    Ok(count)
}

/// Iterates over the objects of a stream held in memory.
///
/// Each record's object must hash to the record's id. Delta trees resolve
/// their original from earlier records of the same stream, then from the
/// reader's store. The trailer count is checked once the records run out.
pub struct StreamReader<'s> {
    data: Vec<u8>,
    pos: usize,
    reader: ObjectReader<'s>,
    trees: HashMap<ObjectId, RevTree>,
    read: u64,
    done: bool,
}

impl<'s> StreamReader<'s> {
    pub fn new(data: Vec<u8>, reader: ObjectReader<'s>) -> Self {
        Self {
            data,
            pos: 0,
            reader,
            trees: HashMap::new(),
            read: 0,
            done: false,
        }
    }

    /// Read a whole stream from `input`.
    pub fn from_reader<R: Read>(mut input: R, reader: ObjectReader<'s>) -> CodecResult<Self> {
        let mut data = Vec::new();
        input.read_to_end(&mut data)?;
        Ok(Self::new(data, reader))
    }

    /// Records read so far.
    pub fn records_read(&self) -> u64 {
        self.read
    }

    fn next_record(&mut self) -> CodecResult<Option<RevObject>> {
        let remaining = self.data.len() - self.pos;
        if remaining == TRAILER_LEN {
            let mut raw = [0u8; TRAILER_LEN];
            raw.copy_from_slice(&self.data[self.pos..]);
            let expected = u64::from_be_bytes(raw);
            self.pos = self.data.len();
            if expected != self.read {
                return Err(CodecError::TrailerMismatch {
                    expected,
                    actual: self.read,
                });
            }
            return Ok(None);
        }
        if remaining < TRAILER_LEN + NUM_BYTES {
            return Err(CodecError::Corrupt {
                offset: self.pos,
                reason: format!("stream ends with {remaining} stray bytes"),
            });
        }

        let mut dec = Decoder::at(&self.data, self.pos);
        let id = dec.id()?;
        let object = self.reader.read_from(&mut dec, id, &self.trees)?;
        if dec.remaining() < TRAILER_LEN {
            return Err(CodecError::Corrupt {
                offset: dec.position(),
                reason: "record overlaps the stream trailer".into(),
            });
        }
        self.pos = dec.position();
        if let RevObject::Tree(tree) = &object {
            self.trees.insert(id, tree.clone());
        }
        self.read += 1;
        Ok(Some(object))
    }
}

impl Iterator for StreamReader<'_> {
    type Item = CodecResult<RevObject>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let next = self.next_record();
        if !matches!(next, Ok(Some(_))) {
            self.done = true;
        }
        next.transpose()
    }
}

/// Read every object of a stream.
pub fn read_stream<R: Read>(input: R, reader: ObjectReader<'_>) -> CodecResult<Vec<RevObject>> {
    StreamReader::from_reader(input, reader)?.collect()
}

/// Write the objects `ids` of `store` as a stream, originals before the
/// delta trees built on them.
pub fn dump_store<W: Write>(
    store: &dyn ObjectStore,
    ids: &[ObjectId],
    out: &mut W,
    version: FormatVersion,
) -> CodecResult<u64> {
    let mut objects = ids
        .iter()
        .map(|id| store.get(id))
        .collect::<Result<Vec<_>, _>>()?;
    objects.sort_by_key(|o| match o {
        RevObject::Tree(t) => t.delta_level(),
        _ => 0,
    });
    let count = write_stream(out, &objects, version)?;
    debug!(count, %version, "dumped objects");
    Ok(count)
}

/// Read a stream into `store`. Returns how many objects were newly inserted.
///
/// Delta originals are resolved through `store` as well, so a stream may
/// build on objects the store already holds.
pub fn restore_store<R: Read>(
    input: R,
    store: &dyn ObjectStore,
    version: FormatVersion,
) -> CodecResult<usize> {
    let reader = ObjectReader::new(version).with_store(store);
    let mut inserted = 0;
    for object in StreamReader::from_reader(input, reader)? {
        if store.put(&object?)? {
            inserted += 1;
        }
    }
    debug!(inserted, %version, "restored objects");
    Ok(inserted)
}
