//! Pieces shared by the CWAV and CSTM walkers: file preamble, tagged blocks,
//! references and reference tables.

use tracing::debug;

use crate::error::{Error, Result};
use crate::parser::{Cursor, Endian, Field, Struct};

/// Magic plus size in front of every block.
pub const BLOCK_HEADER_SIZE: usize = 8;

const BLOCK_HEADER: &[Field] = &[Field::raw("magic", 4), Field::uint("size", 4)];

const REFERENCE: &[Field] = &[
    Field::uint("id", 2),
    Field::padding(2),
    Field::uint("offset", 4),
];

/// Offset value of an absent reference.
pub const NULL_OFFSET: u32 = 0xFFFF_FFFF;

/// Id of a reference that points at a reference table.
pub const REFERENCE_TABLE_ID: u16 = 0x0101;

pub fn check_magic(block: &'static str, expected: [u8; 4], found: [u8; 4]) -> Result<()> {
    if found != expected {
        return Err(Error::MagicMismatch {
            block,
            expected,
            found,
        });
    }
    Ok(())
}

/// Read the file magic and the byte-order mark that follows it.
pub fn read_preamble(cursor: &mut Cursor<'_>, expected: [u8; 4]) -> Result<Endian> {
    let magic = cursor
        .decode_struct(&[Field::raw("magic", 4)])?
        .tag("magic")?;
    check_magic("header", expected, magic)?;
    let order = cursor.read_byte_order_mark()?;
    debug!(
        "Found {} header, {:?} endian",
        magic.escape_ascii(),
        order
    );
    Ok(order)
}

/// Read the block at `offset`, check its magic and return its payload.
pub fn read_block<'a>(
    cursor: &mut Cursor<'a>,
    offset: usize,
    block: &'static str,
    expected: [u8; 4],
) -> Result<&'a [u8]> {
    cursor.seek(offset)?;
    let header = cursor.decode_struct(BLOCK_HEADER)?;
    check_magic(block, expected, header.tag("magic")?)?;
    let size = header.u32("size")?;
    let payload_size = (size as usize)
        .checked_sub(BLOCK_HEADER_SIZE)
        .ok_or(Error::BadBlockSize { block, size })?;
    let payload = cursor.take(payload_size)?;
    debug!(
        "Read {} block at {:#x}: {} payload bytes",
        block,
        offset,
        payload.len()
    );
    Ok(payload)
}

/// An id plus an offset relative to some base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub id: u16,
    pub offset: u32,
}

impl Reference {
    pub fn read(cursor: &mut Cursor<'_>) -> Result<Self> {
        Self::from_struct(&cursor.decode_struct(REFERENCE)?, "id", "offset")
    }

    /// Pick a reference out of a larger struct.
    pub fn from_struct(s: &Struct<'_>, id: &'static str, offset: &'static str) -> Result<Self> {
        Ok(Self {
            id: s.u16(id)?,
            offset: s.u32(offset)?,
        })
    }

    pub fn is_null(&self) -> bool {
        self.offset == NULL_OFFSET
    }

    /// Whether this reference points at a present reference table.
    pub fn is_table(&self) -> bool {
        self.id == REFERENCE_TABLE_ID && !self.is_null()
    }

    /// Absolute position of the target, `base` being what the offset is
    /// relative to.
    pub fn resolve(&self, base: usize, table: &'static str, index: usize) -> Result<usize> {
        if self.is_null() {
            return Err(Error::UnresolvedReference { table, index });
        }
        base.checked_add(self.offset as usize)
            .ok_or(Error::UnresolvedReference { table, index })
    }
}

/// Read a reference table at `start`: a `u32` count and that many
/// references, whose offsets are relative to `start`.
pub fn read_reference_table(cursor: &mut Cursor<'_>, start: usize) -> Result<Vec<Reference>> {
    cursor.seek(start)?;
    let count = cursor
        .decode_struct(&[Field::uint("count", 4)])?
        .u32("count")? as usize;
    let remaining = cursor.data().len() - cursor.position();
    if count > remaining / REFERENCE.iter().map(Field::len).sum::<usize>() {
        return Err(Error::TruncatedInput {
            offset: cursor.position(),
            needed: count.saturating_mul(8),
            available: cursor.data().len(),
        });
    }
    (0..count).map(|_| Reference::read(cursor)).collect()
}

/// Split `payload` into consecutive channel regions, each running from its
/// own start offset to the next channel's (or the payload end).
pub fn contiguous_regions<'a>(payload: &'a [u8], starts: &[usize]) -> Result<Vec<&'a [u8]>> {
    starts
        .iter()
        .enumerate()
        .map(|(index, &start)| {
            let end = starts.get(index + 1).copied().unwrap_or(payload.len());
            if start > end || end > payload.len() {
                return Err(Error::TruncatedInput {
                    offset: start,
                    needed: end.saturating_sub(start),
                    available: payload.len(),
                });
            }
            Ok(&payload[start..end])
        })
        .collect()
}
