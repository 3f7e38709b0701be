//! Scratch record stream format.
//!
//! Every scratch file starts with a fixed header followed by records in write order:
//!
//! ```text
//! header:  b"LSREC" | version: u8 | reserved: u16
//! record:  position: u64 LE | content_len: u32 LE | content: UTF-8 bytes
//! ```
//!
//! End of stream is detected by comparing the read offset to the file length, so the
//! format has no trailer or sentinel record.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

use crate::external_sort::constants::*;
use crate::external_sort::record::Record;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("stream too short for a header ({len} bytes)")]
    MissingHeader { len: u64 },
    #[error("bad magic bytes in stream header")]
    BadMagic,
    #[error("unsupported record format version {0}")]
    UnsupportedVersion(u8),
    #[error("record truncated at offset {offset}")]
    Truncated { offset: u64 },
    #[error("record content at offset {offset} is not valid UTF-8")]
    InvalidUtf8 { offset: u64 },
    #[error("read past end of stream at offset {offset}")]
    EndOfStream { offset: u64 },
    #[error("line of {len} bytes exceeds the record content limit")]
    ContentTooLong { len: usize },
}

pub struct RecordWriter {
    writer: BufWriter<File>,
    records_written: usize,
}

impl RecordWriter {
    /// Creates (or truncates) `path` and writes the stream header.
    pub fn create(path: &Path, buffer_size: usize) -> Result<Self, CodecError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::with_capacity(buffer_size, file);
        writer.write_all(RECORD_MAGIC)?;
        writer.write_all(&[RECORD_FORMAT_VERSION])?;
        writer.write_all(&0u16.to_le_bytes())?;

        Ok(Self {
            writer,
            records_written: 0,
        })
    }

    pub fn write(&mut self, record: &Record) -> Result<(), CodecError> {
        let content = record.content().as_bytes();
        let content_len = u32::try_from(content.len())
            .map_err(|_| CodecError::ContentTooLong { len: content.len() })?;

        self.writer.write_all(&record.position().to_le_bytes())?;
        self.writer.write_all(&content_len.to_le_bytes())?;
        self.writer.write_all(content)?;
        self.records_written += 1;
        Ok(())
    }

    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// Flushes buffered records and returns how many were written.
    pub fn finish(mut self) -> Result<usize, CodecError> {
        self.writer.flush()?;
        Ok(self.records_written)
    }
}

pub struct RecordReader {
    reader: BufReader<File>,
    offset: u64,
    len: u64,
}

impl RecordReader {
    /// Opens `path` and validates the stream header.
    pub fn open(path: &Path, buffer_size: usize) -> Result<Self, CodecError> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        if len < RECORD_HEADER_LEN {
            return Err(CodecError::MissingHeader { len });
        }

        let mut reader = BufReader::with_capacity(buffer_size, file);
        let mut magic = [0u8; 5];
        reader.read_exact(&mut magic)?;
        if &magic != RECORD_MAGIC {
            return Err(CodecError::BadMagic);
        }

        let mut version = [0u8; 1];
        reader.read_exact(&mut version)?;
        if version[0] != RECORD_FORMAT_VERSION {
            return Err(CodecError::UnsupportedVersion(version[0]));
        }

        let mut reserved = [0u8; 2];
        reader.read_exact(&mut reserved)?;

        Ok(Self {
            reader,
            offset: RECORD_HEADER_LEN,
            len,
        })
    }

    pub fn has_next(&self) -> bool {
        self.offset < self.len
    }

    pub fn read(&mut self) -> Result<Record, CodecError> {
        let start = self.offset;
        if !self.has_next() {
            return Err(CodecError::EndOfStream { offset: start });
        }
        if self.len - start < RECORD_FIXED_LEN {
            return Err(CodecError::Truncated { offset: start });
        }

        let mut position = [0u8; 8];
        let mut content_len = [0u8; 4];
        self.read_exact_at(&mut position, start)?;
        self.read_exact_at(&mut content_len, start)?;
        let position = u64::from_le_bytes(position);
        let content_len = u32::from_le_bytes(content_len) as u64;

        if self.len - start - RECORD_FIXED_LEN < content_len {
            return Err(CodecError::Truncated { offset: start });
        }

        let mut content = vec![0u8; content_len as usize];
        self.read_exact_at(&mut content, start)?;
        let content = String::from_utf8(content)
            .map_err(|_| CodecError::InvalidUtf8 { offset: start })?;

        self.offset = start + RECORD_FIXED_LEN + content_len;
        Ok(Record::new(content, position))
    }

    fn read_exact_at(&mut self, buf: &mut [u8], record_start: u64) -> Result<(), CodecError> {
        self.reader.read_exact(buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => CodecError::Truncated { offset: record_start },
            _ => CodecError::Io(e),
        })
    }
}

impl Iterator for RecordReader {
    type Item = Result<Record, CodecError>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.has_next() {
            return None;
        }
        let result = self.read();
        if result.is_err() {
            // A corrupt stream has no trustworthy continuation.
            self.offset = self.len;
        }
        Some(result)
    }
}

pub fn read_all(path: &Path, buffer_size: usize) -> Result<Vec<Record>, CodecError> {
    RecordReader::open(path, buffer_size)?.collect()
}

pub fn write_all(path: &Path, records: &[Record], buffer_size: usize) -> Result<usize, CodecError> {
    let mut writer = RecordWriter::create(path, buffer_size)?;
    for record in records {
        writer.write(record)?;
    }
    writer.finish()
}
