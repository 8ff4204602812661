//! The record codec behind the pack/unpack transport.  A worker packs
//! each of its rows into one buffer as it goes, sends the buffer once,
//! and the coordinator unpacks the rows in the same order.
//!
//! Each record is laid out as
//!
//! ```text
//! row: u32 LE | len: u32 LE | len bytes of payload
//! ```
//!
//! The buffer's capacity is fixed when it is created and computed from
//! the number of records it will hold; writing past it is an error,
//! never a silent truncation.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use error::Error;

/// Bytes of header in front of every record.
pub const RECORD_HEADER: usize = 8;

/// An owned, bounded, append-only record buffer.
#[derive(Debug)]
pub struct PackBuffer {
    bytes: Vec<u8>,
    capacity: usize,
    records: usize,
}

impl PackBuffer {
    /// A buffer that will hold at most `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Result<PackBuffer, Error> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(capacity)
            .map_err(|_| Error::Resource {
                what: "pack buffer",
                bytes: capacity,
            })?;
        Ok(PackBuffer {
            bytes,
            capacity,
            records: 0,
        })
    }

    /// A buffer sized for exactly `records` rows of `width` bytes.
    pub fn for_records(records: usize, width: usize) -> Result<PackBuffer, Error> {
        PackBuffer::with_capacity(records * (RECORD_HEADER + width))
    }

    /// Bytes written so far; the write cursor.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether nothing has been packed.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The fixed limit.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records packed so far.
    pub fn records(&self) -> usize {
        self.records
    }

    /// Append one record.
    pub fn pack(&mut self, row: usize, payload: &[u8]) -> Result<(), Error> {
        let requested = RECORD_HEADER + payload.len();
        let remaining = self.capacity - self.bytes.len();
        if requested > remaining {
            return Err(Error::Capacity {
                requested,
                remaining,
                capacity: self.capacity,
            });
        }
        if row > u32::max_value() as usize || payload.len() > u32::max_value() as usize {
            return Err(Error::Transport(format!(
                "record for row {} ({} bytes) does not fit the record header",
                row,
                payload.len()
            )));
        }
        self.bytes.write_u32::<LittleEndian>(row as u32)?;
        self.bytes.write_u32::<LittleEndian>(payload.len() as u32)?;
        self.bytes.extend_from_slice(payload);
        self.records += 1;
        Ok(())
    }

    /// Give up the packed bytes for sending.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Reads records back out of a packed buffer.
pub struct Unpacker<'a> {
    cursor: Cursor<&'a [u8]>,
    records: usize,
}

impl<'a> Unpacker<'a> {
    /// Start reading at the front of `bytes`.
    pub fn new(bytes: &'a [u8]) -> Unpacker<'a> {
        Unpacker {
            cursor: Cursor::new(bytes),
            records: 0,
        }
    }

    /// Bytes not yet read.
    pub fn remaining(&self) -> usize {
        self.cursor.get_ref().len() - self.cursor.position() as usize
    }

    /// Records read so far.
    pub fn records(&self) -> usize {
        self.records
    }

    /// Read the next record as `(row, payload)`.
    pub fn unpack(&mut self) -> Result<(usize, &'a [u8]), Error> {
        if self.remaining() < RECORD_HEADER {
            return Err(Error::Transport(format!(
                "record {} truncated: {} bytes left, header needs {}",
                self.records,
                self.remaining(),
                RECORD_HEADER
            )));
        }
        let row = self.cursor.read_u32::<LittleEndian>()? as usize;
        let len = self.cursor.read_u32::<LittleEndian>()? as usize;
        if self.remaining() < len {
            return Err(Error::Transport(format!(
                "record {} (row {}) truncated: {} of {} payload bytes present",
                self.records,
                row,
                self.remaining(),
                len
            )));
        }
        let start = self.cursor.position() as usize;
        let bytes: &'a [u8] = *self.cursor.get_ref();
        let payload = &bytes[start..start + len];
        self.cursor.set_position((start + len) as u64);
        self.records += 1;
        Ok((row, payload))
    }

    /// Confirm the whole buffer was consumed.
    pub fn finish(self) -> Result<usize, Error> {
        match self.remaining() {
            0 => Ok(self.records),
            extra => Err(Error::Transport(format!(
                "{} unread bytes after {} records",
                extra, self.records
            ))),
        }
    }
}
