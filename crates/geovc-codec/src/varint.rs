use crate::error::{CodecError, CodecResult};

/// Append `value` as an unsigned LEB128 varint.
pub fn encode_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value > 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Decode a varint from the front of `data`. Returns (value, bytes_consumed).
///
/// `offset` is only used for error reporting.
pub fn decode_varint(data: &[u8], offset: usize) -> CodecResult<(u64, usize)> {
    let mut value: u64 = 0;
    let mut shift = 0;
    for (i, &byte) in data.iter().enumerate() {
        if shift == 63 && byte > 1 {
            return Err(CodecError::Corrupt {
                offset: offset + i,
                reason: "varint overflow".into(),
            });
        }
        value |= u64::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        shift += 7;
        if shift > 63 {
            return Err(CodecError::Corrupt {
                offset: offset + i,
                reason: "varint overflow".into(),
            });
        }
    }
    Err(CodecError::Corrupt {
        offset: offset + data.len(),
        reason: "truncated varint".into(),
    })
}
