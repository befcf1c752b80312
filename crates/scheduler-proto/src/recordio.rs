//! RecordIO de-framing.
//!
//! The Mesos master streams events as a sequence of records, each prefixed
//! by its length in bytes as an ASCII decimal string followed by `\n`:
//!
//! ```text
//! <ascii-decimal-length>\n<record-bytes><ascii-decimal-length>\n<record-bytes>...
//! ```
//!
//! `Decoder` accumulates body chunks as they arrive and yields whole
//! records as soon as enough bytes have accumulated, carrying any partial
//! record (length line or payload) across chunk boundaries.

use bytes::{Buf, Bytes, BytesMut};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FramingError {
    #[error("non-ASCII-decimal length prefix: {0:?}")]
    BadLengthPrefix(String),
    #[error("length prefix overflowed usize")]
    LengthOverflow,
}

/// Incremental RecordIO decoder with internal carry-over buffering.
#[derive(Debug, Default)]
pub struct Decoder {
    buf: BytesMut,
}

impl Decoder {
    pub fn new() -> Self {
        Decoder { buf: BytesMut::new() }
    }

    /// Feed a newly received body chunk and drain as many complete records
    /// as are now available. Partial trailing data is retained internally.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Bytes>, FramingError> {
        self.buf.extend_from_slice(chunk);
        let mut records = Vec::new();
        loop {
            let Some(newline_pos) = self.buf.iter().position(|b| *b == b'\n') else {
                break;
            };
            let len_str = std::str::from_utf8(&self.buf[..newline_pos])
                .map_err(|_| FramingError::BadLengthPrefix(format!("{:?}", &self.buf[..newline_pos])))?;
            let record_len: usize = len_str
                .parse()
                .map_err(|_| FramingError::BadLengthPrefix(len_str.to_owned()))?;
            let record_start = newline_pos + 1;
            let needed = record_start
                .checked_add(record_len)
                .ok_or(FramingError::LengthOverflow)?;
            if self.buf.len() < needed {
                // Whole record not yet available; wait for more chunks.
                break;
            }
            self.buf.advance(record_start);
            let record = self.buf.split_to(record_len).freeze();
            records.push(record);
        }
        Ok(records)
    }
}
