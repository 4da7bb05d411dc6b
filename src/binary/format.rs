//! Binary format constants and structures.

use byteorder::{BigEndian, ByteOrder};
use std::cmp::Ordering;
use std::fmt;

use crate::{Error, Result};

/// Size of a data block in bytes.
pub const BLOCK_SIZE: usize = 4096;

/// Header size in bytes (big-endian i32 block count).
pub const HEADER_SIZE: usize = 4;

/// Size of the per-block record count stored in each metadata entry.
pub const COUNT_SIZE: usize = 4;

/// Primitive kind of a key or value field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// 8-bit signed integer
    Byte,
    /// Boolean stored in one byte
    Bool,
    /// 16-bit signed integer
    Short,
    /// 16-bit UTF-16 code unit
    Char,
    /// 32-bit signed integer
    Int,
    /// 32-bit IEEE-754 float
    Float,
    /// 64-bit signed integer
    Long,
    /// 64-bit IEEE-754 float
    Double,
}

impl FieldType {
    /// Width of the field in bytes.
    pub fn width(self) -> usize {
        match self {
            FieldType::Byte | FieldType::Bool => 1,
            FieldType::Short | FieldType::Char => 2,
            FieldType::Int | FieldType::Float => 4,
            FieldType::Long | FieldType::Double => 8,
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Byte => "byte",
            FieldType::Bool => "bool",
            FieldType::Short => "short",
            FieldType::Char => "char",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Long => "long",
            FieldType::Double => "double",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed field value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Byte(i8),
    Bool(bool),
    Short(i16),
    Char(u16),
    Int(i32),
    Float(f32),
    Long(i64),
    Double(f64),
}

impl FieldValue {
    /// The kind of this value.
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Byte(_) => FieldType::Byte,
            FieldValue::Bool(_) => FieldType::Bool,
            FieldValue::Short(_) => FieldType::Short,
            FieldValue::Char(_) => FieldType::Char,
            FieldValue::Int(_) => FieldType::Int,
            FieldValue::Float(_) => FieldType::Float,
            FieldValue::Long(_) => FieldType::Long,
            FieldValue::Double(_) => FieldType::Double,
        }
    }

    /// Append the big-endian encoding of this value to `out`.
    ///
    /// Booleans use the legacy mapping `true => 0x00`, `false => 0x01`.
    pub fn write_bytes(&self, out: &mut Vec<u8>) {
        match *self {
            FieldValue::Byte(v) => out.push(v as u8),
            FieldValue::Bool(v) => out.push(if v { 0 } else { 1 }),
            FieldValue::Short(v) => out.extend_from_slice(&v.to_be_bytes()),
            FieldValue::Char(v) => out.extend_from_slice(&v.to_be_bytes()),
            FieldValue::Int(v) => out.extend_from_slice(&v.to_be_bytes()),
            FieldValue::Float(v) => out.extend_from_slice(&v.to_bits().to_be_bytes()),
            FieldValue::Long(v) => out.extend_from_slice(&v.to_be_bytes()),
            FieldValue::Double(v) => out.extend_from_slice(&v.to_bits().to_be_bytes()),
        }
    }

    /// Decode a value of the given kind. `bytes` must be exactly
    /// `kind.width()` long.
    pub fn from_bytes(kind: FieldType, bytes: &[u8]) -> Self {
        debug_assert_eq!(bytes.len(), kind.width());
        match kind {
            FieldType::Byte => FieldValue::Byte(bytes[0] as i8),
            FieldType::Bool => FieldValue::Bool(bytes[0] == 0),
            FieldType::Short => FieldValue::Short(BigEndian::read_i16(bytes)),
            FieldType::Char => FieldValue::Char(BigEndian::read_u16(bytes)),
            FieldType::Int => FieldValue::Int(BigEndian::read_i32(bytes)),
            FieldType::Float => FieldValue::Float(BigEndian::read_f32(bytes)),
            FieldType::Long => FieldValue::Long(BigEndian::read_i64(bytes)),
            FieldType::Double => FieldValue::Double(BigEndian::read_f64(bytes)),
        }
    }

    /// The value as an `i32`, if it is an `Int`.
    pub fn as_i32(&self) -> Option<i32> {
        match *self {
            FieldValue::Int(v) => Some(v),
            _ => None,
        }
    }

    /// The value as an `f64`, if it is a `Double`.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            FieldValue::Double(v) => Some(v),
            _ => None,
        }
    }
}

/// Ordered field kinds of a store's keys and values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    key: Vec<FieldType>,
    value: Vec<FieldType>,
}

impl Schema {
    /// Create a schema from key and value field kinds.
    pub fn new(key: Vec<FieldType>, value: Vec<FieldType>) -> Self {
        Self { key, value }
    }

    /// Schema of the cell tower database: key `(area, cell, country,
    /// operator)` as ints, value `(longitude, latitude)` as doubles.
    pub fn cell_towers() -> Self {
        Self::new(vec![FieldType::Int; 4], vec![FieldType::Double; 2])
    }

    pub fn key_types(&self) -> &[FieldType] {
        &self.key
    }

    pub fn value_types(&self) -> &[FieldType] {
        &self.value
    }

    /// Per-field key widths in bytes.
    pub fn key_widths(&self) -> Vec<usize> {
        self.key.iter().map(|t| t.width()).collect()
    }

    /// Per-field value widths in bytes.
    pub fn value_widths(&self) -> Vec<usize> {
        self.value.iter().map(|t| t.width()).collect()
    }

    /// Uncompressed key width.
    pub fn key_width(&self) -> usize {
        self.key.iter().map(|t| t.width()).sum()
    }

    /// Uncompressed value width.
    pub fn value_width(&self) -> usize {
        self.value.iter().map(|t| t.width()).sum()
    }

    /// Size of one metadata entry: count, min/max key, min/max value.
    pub fn meta_entry_size(&self) -> usize {
        COUNT_SIZE + 2 * self.key_width() + 2 * self.value_width()
    }

    /// File offset of the metadata entry for `block`.
    pub fn meta_offset(&self, block: u32) -> u64 {
        HEADER_SIZE as u64 + self.meta_entry_size() as u64 * block as u64
    }

    /// File offset of the data region: the first block boundary at or after
    /// the end of the metadata table.
    pub fn data_start(&self, block_count: u32) -> u64 {
        let table_end = self.meta_offset(block_count);
        table_end.div_ceil(BLOCK_SIZE as u64) * BLOCK_SIZE as u64
    }

    /// File offset of `block`'s data.
    pub fn block_offset(&self, block_count: u32, block: u32) -> u64 {
        self.data_start(block_count) + block as u64 * BLOCK_SIZE as u64
    }

    /// Encode a full key or, when `allow_prefix` is set, a leading prefix of
    /// the key fields.
    pub fn encode_key(&self, key: &[FieldValue], allow_prefix: bool) -> Result<Vec<u8>> {
        if key.is_empty() || key.len() > self.key.len() {
            return Err(Error::MalformedKey(format!(
                "key has {} fields, schema has {}",
                key.len(),
                self.key.len()
            )));
        }
        if !allow_prefix && key.len() != self.key.len() {
            return Err(Error::MalformedKey(format!(
                "point lookup needs {} fields, got {}",
                self.key.len(),
                key.len()
            )));
        }
        encode_fields(&self.key, key, "key")
    }

    /// Encode a full value.
    pub fn encode_value(&self, value: &[FieldValue]) -> Result<Vec<u8>> {
        if value.len() != self.value.len() {
            return Err(Error::MalformedKey(format!(
                "value has {} fields, schema has {}",
                value.len(),
                self.value.len()
            )));
        }
        encode_fields(&self.value, value, "value")
    }

    /// Decode raw key bytes into typed fields.
    pub fn decode_key(&self, raw: &[u8]) -> Vec<FieldValue> {
        decode_fields(&self.key, raw)
    }

    /// Decode raw value bytes into typed fields.
    pub fn decode_value(&self, raw: &[u8]) -> Vec<FieldValue> {
        decode_fields(&self.value, raw)
    }
}

fn encode_fields(types: &[FieldType], values: &[FieldValue], what: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(types.iter().map(|t| t.width()).sum());
    for (i, (kind, value)) in types.iter().zip(values).enumerate() {
        if value.field_type() != *kind {
            return Err(Error::MalformedKey(format!(
                "{} field {} is {}, expected {}",
                what,
                i,
                value.field_type(),
                kind
            )));
        }
        value.write_bytes(&mut out);
    }
    Ok(out)
}

fn decode_fields(types: &[FieldType], raw: &[u8]) -> Vec<FieldValue> {
    let mut offset = 0;
    types
        .iter()
        .map(|kind| {
            let width = kind.width();
            let value = FieldValue::from_bytes(*kind, &raw[offset..offset + width]);
            offset += width;
            value
        })
        .collect()
}

/// Metadata of one data block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMeta {
    /// Block index
    pub id: u32,
    /// Number of records in the block
    pub count: u32,
    /// Per-field minimum key (raw, field-concatenated)
    pub key_low: Vec<u8>,
    /// Per-field maximum key
    pub key_high: Vec<u8>,
    /// Per-field minimum value
    pub value_low: Vec<u8>,
    /// Per-field maximum value
    pub value_high: Vec<u8>,
}

impl BlockMeta {
    /// Parse a metadata entry read from the file.
    pub fn parse(schema: &Schema, id: u32, raw: &[u8]) -> Result<Self> {
        let k = schema.key_width();
        let v = schema.value_width();
        if raw.len() != schema.meta_entry_size() {
            return Err(Error::Corruption {
                block: id,
                reason: format!(
                    "metadata entry is {} bytes, expected {}",
                    raw.len(),
                    schema.meta_entry_size()
                ),
            });
        }
        let count = BigEndian::read_i32(&raw[..COUNT_SIZE]);
        if count < 0 {
            return Err(Error::Corruption {
                block: id,
                reason: format!("negative record count {}", count),
            });
        }
        let mut offset = COUNT_SIZE;
        let mut take = |len: usize| {
            let part = raw[offset..offset + len].to_vec();
            offset += len;
            part
        };
        Ok(Self {
            id,
            count: count as u32,
            key_low: take(k),
            key_high: take(k),
            value_low: take(v),
            value_high: take(v),
        })
    }

    /// Serialize this entry in file order.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            COUNT_SIZE + 2 * self.key_low.len() + 2 * self.value_low.len(),
        );
        out.extend_from_slice(&(self.count as i32).to_be_bytes());
        out.extend_from_slice(&self.key_low);
        out.extend_from_slice(&self.key_high);
        out.extend_from_slice(&self.value_low);
        out.extend_from_slice(&self.value_high);
        out
    }

    /// Render with fields split according to `schema`.
    pub fn display<'a>(&'a self, schema: &'a Schema) -> BlockMetaDisplay<'a> {
        BlockMetaDisplay { meta: self, schema }
    }
}

fn write_tuple(f: &mut fmt::Formatter<'_>, raw: &[u8], widths: &[usize]) -> fmt::Result {
    write!(f, "[")?;
    let mut offset = 0;
    for (i, w) in widths.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, "[")?;
        for (j, b) in raw[offset..offset + w].iter().enumerate() {
            if j > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", b)?;
        }
        write!(f, "]")?;
        offset += w;
    }
    write!(f, "]")
}

/// Display adapter that splits raw bounds into their fields.
pub struct BlockMetaDisplay<'a> {
    pub meta: &'a BlockMeta,
    pub schema: &'a Schema,
}

impl fmt::Display for BlockMetaDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kw = self.schema.key_widths();
        let vw = self.schema.value_widths();
        write!(f, "BLOCK(id={},entries={},klow=", self.meta.id, self.meta.count)?;
        write_tuple(f, &self.meta.key_low, &kw)?;
        write!(f, ",khigh=")?;
        write_tuple(f, &self.meta.key_high, &kw)?;
        write!(f, ",vlow=")?;
        write_tuple(f, &self.meta.value_low, &vw)?;
        write!(f, ",vhigh=")?;
        write_tuple(f, &self.meta.value_high, &vw)?;
        write!(f, ")")
    }
}

/// Compare two keys over the fields they both have.
///
/// Fields are fixed width and concatenated in declared order, so an unsigned
/// byte comparison of the common prefix is the same as comparing field by
/// field, most significant byte first.
pub fn compare_prefix(left: &[u8], right: &[u8]) -> Ordering {
    let len = left.len().min(right.len());
    left[..len].cmp(&right[..len])
}

/// Number of bytes stored per field for a block with the given bounds.
///
/// Leading bytes on which `low` and `high` agree are elided. From the first
/// differing byte on, every byte of the field is stored, even if later
/// bytes agree again.
pub fn suffix_widths(low: &[u8], high: &[u8], widths: &[usize]) -> Vec<usize> {
    let mut offset = 0;
    widths
        .iter()
        .map(|&width| {
            let l = &low[offset..offset + width];
            let h = &high[offset..offset + width];
            offset += width;
            match l.iter().zip(h).position(|(a, b)| a != b) {
                Some(first_diff) => width - first_diff,
                None => 0,
            }
        })
        .collect()
}

/// Check that every field of `raw` lies within the matching fields of
/// `low` and `high`.
pub fn fields_within(raw: &[u8], low: &[u8], high: &[u8], widths: &[usize]) -> bool {
    let mut offset = 0;
    for &width in widths {
        let range = offset..offset + width;
        if raw[range.clone()] < low[range.clone()] || raw[range.clone()] > high[range] {
            return false;
        }
        offset += width;
    }
    true
}
