//! Schema-driven reader over an immutable byte buffer.
//!
//! Container structures are described as ordered lists of [`Field`]s and
//! decoded by one generic routine, [`Cursor::decode_struct`]. Integer fields
//! follow the cursor's byte order, which is fixed once by the byte-order mark
//! near the start of every file.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use indexmap::IndexMap;

use crate::error::{Error, Result};

/// Byte order used to decode integer fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

/// How the bytes of a [`Field`] are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Integer of the field width. `order` pins the byte order regardless of
    /// the cursor's.
    Int { signed: bool, order: Option<Endian> },
    /// Untouched byte slice.
    Raw,
    /// Skipped, never appears in a decoded struct.
    Padding,
}

/// One entry of a structure schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub width: usize,
    pub kind: FieldKind,
    pub count: usize,
}

impl Field {
    pub const fn uint(name: &'static str, width: usize) -> Self {
        assert!(width >= 1 && width <= 8);
        Self {
            name,
            width,
            kind: FieldKind::Int {
                signed: false,
                order: None,
            },
            count: 1,
        }
    }

    pub const fn int(name: &'static str, width: usize) -> Self {
        assert!(width >= 1 && width <= 8);
        Self {
            name,
            width,
            kind: FieldKind::Int {
                signed: true,
                order: None,
            },
            count: 1,
        }
    }

    pub const fn raw(name: &'static str, width: usize) -> Self {
        Self {
            name,
            width,
            kind: FieldKind::Raw,
            count: 1,
        }
    }

    pub const fn padding(width: usize) -> Self {
        Self {
            name: "",
            width,
            kind: FieldKind::Padding,
            count: 1,
        }
    }

    /// Repeat this field `count` times; it then decodes to a [`Value::List`].
    pub const fn repeated(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Pin the byte order of an integer field.
    pub const fn with_order(mut self, order: Endian) -> Self {
        if let FieldKind::Int { signed, .. } = self.kind {
            self.kind = FieldKind::Int {
                signed,
                order: Some(order),
            };
        }
        self
    }

    /// Total bytes consumed by this field.
    pub const fn len(&self) -> usize {
        self.width * self.count
    }
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value<'a> {
    Int(i64),
    Bytes(&'a [u8]),
    List(Vec<Value<'a>>),
}

impl<'a> Value<'a> {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&'a [u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value<'a>]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

/// Result of [`Cursor::decode_struct`]: named values in schema order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Struct<'a> {
    fields: IndexMap<&'static str, Value<'a>>,
}

impl<'a> Struct<'a> {
    pub fn get(&self, name: &'static str) -> Result<&Value<'a>> {
        self.fields.get(name).ok_or(Error::MissingField(name))
    }

    pub fn int(&self, name: &'static str) -> Result<i64> {
        self.get(name)?.as_int().ok_or(Error::MissingField(name))
    }

    // Integer widths in the schemas never exceed 4 bytes.
    pub fn u8(&self, name: &'static str) -> Result<u8> {
        Ok(self.int(name)? as u8)
    }

    pub fn u16(&self, name: &'static str) -> Result<u16> {
        Ok(self.int(name)? as u16)
    }

    pub fn u32(&self, name: &'static str) -> Result<u32> {
        Ok(self.int(name)? as u32)
    }

    pub fn bytes(&self, name: &'static str) -> Result<&'a [u8]> {
        self.get(name)?.as_bytes().ok_or(Error::MissingField(name))
    }

    /// Four-byte tag field, e.g. a block magic.
    pub fn tag(&self, name: &'static str) -> Result<[u8; 4]> {
        self.bytes(name)?
            .try_into()
            .map_err(|_| Error::MissingField(name))
    }

    pub fn i16_list<const N: usize>(&self, name: &'static str) -> Result<[i16; N]> {
        let items = self.get(name)?.as_list().ok_or(Error::MissingField(name))?;
        if items.len() != N {
            return Err(Error::MissingField(name));
        }
        let mut out = [0i16; N];
        for (slot, item) in out.iter_mut().zip(items) {
            *slot = item.as_int().ok_or(Error::MissingField(name))? as i16;
        }
        Ok(out)
    }
}

/// Read position into a byte buffer plus the file's byte order.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
    order: Endian,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            order: Endian::default(),
        }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn byte_order(&self) -> Endian {
        self.order
    }

    /// Reposition to an absolute offset. Seeking to the very end is allowed.
    pub fn seek(&mut self, offset: usize) -> Result<()> {
        if offset > self.data.len() {
            return Err(Error::TruncatedInput {
                offset,
                needed: 0,
                available: self.data.len(),
            });
        }
        self.pos = offset;
        Ok(())
    }

    /// Run `f` at `offset`, then put the cursor back where it was, whether
    /// `f` succeeded or not.
    pub fn peek_at<T>(&mut self, offset: usize, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = self.pos;
        let result = self.seek(offset).and_then(|()| f(self));
        self.pos = saved;
        result
    }

    /// Consume `len` bytes.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(Error::TruncatedInput {
                offset: self.pos,
                needed: len,
                available: self.data.len(),
            })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    /// Read the 2-byte byte-order mark and fix the cursor's byte order.
    ///
    /// The mark is always read little-endian; `0xFEFF` means a little-endian
    /// file, anything else big-endian.
    pub fn read_byte_order_mark(&mut self) -> Result<Endian> {
        let bom = Field::uint("bom", 2).with_order(Endian::Little);
        let mark = self.decode_value(&bom)?.and_then(|v| v.as_int());
        self.order = if mark == Some(0xFEFF) {
            Endian::Little
        } else {
            Endian::Big
        };
        Ok(self.order)
    }

    /// Decode a single field. Padding yields `None`.
    pub fn decode_value(&mut self, field: &Field) -> Result<Option<Value<'a>>> {
        let bytes = self.take(field.len())?;
        if field.kind == FieldKind::Padding {
            return Ok(None);
        }
        if field.count == 1 {
            return Ok(Some(self.convert(bytes, field)));
        }
        let items = bytes
            .chunks_exact(field.width)
            .map(|chunk| self.convert(chunk, field))
            .collect();
        Ok(Some(Value::List(items)))
    }

    /// Decode every field of `schema` in order.
    pub fn decode_struct(&mut self, schema: &[Field]) -> Result<Struct<'a>> {
        let mut out = Struct::default();
        for field in schema {
            if let Some(value) = self.decode_value(field)? {
                out.fields.insert(field.name, value);
            }
        }
        Ok(out)
    }

    fn convert(&self, bytes: &'a [u8], field: &Field) -> Value<'a> {
        match field.kind {
            FieldKind::Int { signed, order } => {
                let n = bytes.len();
                let value = match (order.unwrap_or(self.order), signed) {
                    (Endian::Little, false) => LittleEndian::read_uint(bytes, n) as i64,
                    (Endian::Little, true) => LittleEndian::read_int(bytes, n),
                    (Endian::Big, false) => BigEndian::read_uint(bytes, n) as i64,
                    (Endian::Big, true) => BigEndian::read_int(bytes, n),
                };
                Value::Int(value)
            }
            FieldKind::Raw | FieldKind::Padding => Value::Bytes(bytes),
        }
    }
}
