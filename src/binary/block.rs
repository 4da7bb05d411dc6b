//! Per-block prefix-elision codec.
//!
//! Inside a block every field is stored with only the bytes that can vary
//! within the block's bounds: leading bytes shared by the field's minimum
//! and maximum are dropped and restored from the minimum on decode.

use super::format::{fields_within, suffix_widths, BlockMeta, Schema, BLOCK_SIZE};
use crate::{Error, Result};

/// Byte layout of the records of one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLayout {
    key_widths: Vec<usize>,
    value_widths: Vec<usize>,
    key_suffix: Vec<usize>,
    value_suffix: Vec<usize>,
}

impl BlockLayout {
    /// Layout of a block described by `meta`.
    pub fn new(schema: &Schema, meta: &BlockMeta) -> Self {
        Self::from_bounds(
            schema,
            &meta.key_low,
            &meta.key_high,
            &meta.value_low,
            &meta.value_high,
        )
    }

    /// Layout for the given raw bounds.
    pub fn from_bounds(
        schema: &Schema,
        key_low: &[u8],
        key_high: &[u8],
        value_low: &[u8],
        value_high: &[u8],
    ) -> Self {
        let key_widths = schema.key_widths();
        let value_widths = schema.value_widths();
        let key_suffix = suffix_widths(key_low, key_high, &key_widths);
        let value_suffix = suffix_widths(value_low, value_high, &value_widths);
        Self {
            key_widths,
            value_widths,
            key_suffix,
            value_suffix,
        }
    }

    /// Stored bytes per key.
    pub fn key_record_width(&self) -> usize {
        self.key_suffix.iter().sum()
    }

    /// Stored bytes per value.
    pub fn value_record_width(&self) -> usize {
        self.value_suffix.iter().sum()
    }

    /// Stored bytes per record.
    pub fn record_width(&self) -> usize {
        self.key_record_width() + self.value_record_width()
    }

    /// Payload length of a block holding `count` records.
    pub fn payload_len(&self, count: u32) -> usize {
        count as usize * self.record_width()
    }

    /// Append the stored form of one record to `out`.
    pub fn encode_record(&self, key: &[u8], value: &[u8], out: &mut Vec<u8>) {
        push_suffixes(key, &self.key_widths, &self.key_suffix, out);
        push_suffixes(value, &self.value_widths, &self.value_suffix, out);
    }
}

fn push_suffixes(raw: &[u8], widths: &[usize], suffix: &[usize], out: &mut Vec<u8>) {
    let mut field_end = 0;
    for (&width, &stored) in widths.iter().zip(suffix) {
        field_end += width;
        out.extend_from_slice(&raw[field_end - stored..field_end]);
    }
}

/// Overlay stored suffixes from `data` onto `buf`, returning the number of
/// bytes consumed.
fn overlay_suffixes(data: &[u8], widths: &[usize], suffix: &[usize], buf: &mut [u8]) -> usize {
    let mut field_end = 0;
    let mut read = 0;
    for (&width, &stored) in widths.iter().zip(suffix) {
        field_end += width;
        if stored > 0 {
            buf[field_end - stored..field_end].copy_from_slice(&data[read..read + stored]);
            read += stored;
        }
    }
    read
}

/// Sequential decoder over the records of one block.
///
/// Keys are decoded one at a time; the caller then either skips or takes
/// the value, so scans can stop as soon as sorted order rules out further
/// matches.
pub struct BlockCursor<'a> {
    meta: &'a BlockMeta,
    layout: BlockLayout,
    data: &'a [u8],
    offset: usize,
    remaining: u32,
    key: Vec<u8>,
    value_pending: bool,
}

impl<'a> BlockCursor<'a> {
    /// Create a cursor over `data`, the block's stored payload.
    pub fn new(schema: &Schema, meta: &'a BlockMeta, data: &'a [u8]) -> Result<Self> {
        let layout = BlockLayout::new(schema, meta);
        let needed = layout.payload_len(meta.count);
        if needed > BLOCK_SIZE {
            return Err(Error::Corruption {
                block: meta.id,
                reason: format!("{} records need {} bytes", meta.count, needed),
            });
        }
        if data.len() < needed {
            return Err(Error::Corruption {
                block: meta.id,
                reason: format!("payload is {} bytes, expected {}", data.len(), needed),
            });
        }
        Ok(Self {
            meta,
            layout,
            data,
            offset: 0,
            remaining: meta.count,
            key: meta.key_low.clone(),
            value_pending: false,
        })
    }

    /// Decode the next key. Returns `false` once the block is exhausted.
    pub fn advance(&mut self) -> Result<bool> {
        if self.value_pending {
            self.skip_value();
        }
        if self.remaining == 0 {
            return Ok(false);
        }
        self.remaining -= 1;
        self.offset += overlay_suffixes(
            &self.data[self.offset..],
            &self.layout.key_widths,
            &self.layout.key_suffix,
            &mut self.key,
        );
        if !fields_within(
            &self.key,
            &self.meta.key_low,
            &self.meta.key_high,
            &self.layout.key_widths,
        ) {
            return Err(Error::Corruption {
                block: self.meta.id,
                reason: "decoded key outside block bounds".to_string(),
            });
        }
        self.value_pending = true;
        Ok(true)
    }

    /// The most recently decoded key.
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Skip the value belonging to the current key.
    pub fn skip_value(&mut self) {
        if self.value_pending {
            self.offset += self.layout.value_record_width();
            self.value_pending = false;
        }
    }

    /// Decode the value belonging to the current key.
    pub fn take_value(&mut self) -> Result<Vec<u8>> {
        let mut value = self.meta.value_low.clone();
        if !self.value_pending {
            return Ok(value);
        }
        self.offset += overlay_suffixes(
            &self.data[self.offset..],
            &self.layout.value_widths,
            &self.layout.value_suffix,
            &mut value,
        );
        self.value_pending = false;
        if !fields_within(
            &value,
            &self.meta.value_low,
            &self.meta.value_high,
            &self.layout.value_widths,
        ) {
            return Err(Error::Corruption {
                block: self.meta.id,
                reason: "decoded value outside block bounds".to_string(),
            });
        }
        Ok(value)
    }
}

/// Decode every record of a block.
pub fn decode_block(schema: &Schema, meta: &BlockMeta, data: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
    let mut cursor = BlockCursor::new(schema, meta, data)?;
    let mut records = Vec::with_capacity(meta.count as usize);
    while cursor.advance()? {
        let key = cursor.key().to_vec();
        let value = cursor.take_value()?;
        records.push((key, value));
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::format::{FieldType, FieldValue};

    fn raw(schema: &Schema, key: &[i32], value: &[f64]) -> (Vec<u8>, Vec<u8>) {
        let key: Vec<FieldValue> = key.iter().map(|v| FieldValue::Int(*v)).collect();
        let value: Vec<FieldValue> = value.iter().map(|v| FieldValue::Double(*v)).collect();
        (
            schema.encode_key(&key, false).unwrap(),
            schema.encode_value(&value).unwrap(),
        )
    }

    fn field_bounds(rows: &[&[u8]], widths: &[usize], max: bool) -> Vec<u8> {
        let mut out = rows[0].to_vec();
        let mut offset = 0;
        for w in widths {
            for row in rows {
                let field = &row[offset..offset + w];
                let cur = &out[offset..offset + w];
                if (max && field > cur) || (!max && field < cur) {
                    out[offset..offset + w].copy_from_slice(field);
                }
            }
            offset += w;
        }
        out
    }

    fn meta_for(schema: &Schema, records: &[(Vec<u8>, Vec<u8>)]) -> BlockMeta {
        let keys: Vec<&[u8]> = records.iter().map(|r| r.0.as_slice()).collect();
        let values: Vec<&[u8]> = records.iter().map(|r| r.1.as_slice()).collect();
        let kw = schema.key_widths();
        let vw = schema.value_widths();
        BlockMeta {
            id: 0,
            count: records.len() as u32,
            key_low: field_bounds(&keys, &kw, false),
            key_high: field_bounds(&keys, &kw, true),
            value_low: field_bounds(&values, &vw, false),
            value_high: field_bounds(&values, &vw, true),
        }
    }

    #[test]
    fn test_layout_elides_shared_prefix() {
        let schema = Schema::cell_towers();
        let records = vec![
            raw(&schema, &[100, 200, 262, 1], &[13.0, 52.0]),
            raw(&schema, &[100, 201, 262, 2], &[13.0, 52.5]),
        ];
        let meta = meta_for(&schema, &records);
        let layout = BlockLayout::new(&schema, &meta);

        // area and country are constant, cell and operator differ in the last byte
        assert_eq!(layout.key_record_width(), 2);
        assert!(layout.value_record_width() < 16);
        assert_eq!(layout.payload_len(2), 2 * layout.record_width());
    }

    #[test]
    fn test_block_roundtrip() {
        let schema = Schema::cell_towers();
        let records = vec![
            raw(&schema, &[100, 200, 262, 1], &[13.0, 52.0]),
            raw(&schema, &[100, 200, 262, 2], &[13.25, 52.125]),
            raw(&schema, &[100, 70000, 262, 1], &[-0.5, 51.0]),
            raw(&schema, &[101, 5, 262, 3], &[14.0, 53.0]),
        ];
        let meta = meta_for(&schema, &records);
        let layout = BlockLayout::new(&schema, &meta);

        let mut payload = Vec::new();
        for (k, v) in &records {
            layout.encode_record(k, v, &mut payload);
        }
        assert_eq!(payload.len(), layout.payload_len(4));

        let decoded = decode_block(&schema, &meta, &payload).unwrap();
        assert_eq!(decoded, records);
    }

    #[test]
    fn test_cursor_skips_values() {
        let schema = Schema::new(vec![FieldType::Short], vec![FieldType::Int]);
        let records: Vec<(Vec<u8>, Vec<u8>)> = (0..10i16)
            .map(|i| {
                (
                    i.to_be_bytes().to_vec(),
                    (i as i32 * 1000).to_be_bytes().to_vec(),
                )
            })
            .collect();
        let meta = meta_for(&schema, &records);
        let layout = BlockLayout::new(&schema, &meta);
        let mut payload = Vec::new();
        for (k, v) in &records {
            layout.encode_record(k, v, &mut payload);
        }

        let mut cursor = BlockCursor::new(&schema, &meta, &payload).unwrap();
        let mut seen = 0;
        while cursor.advance().unwrap() {
            if cursor.key() == 7i16.to_be_bytes() {
                assert_eq!(cursor.take_value().unwrap(), 7000i32.to_be_bytes().to_vec());
            }
            seen += 1;
        }
        assert_eq!(seen, 10);
    }

    #[test]
    fn test_short_payload_is_corruption() {
        let schema = Schema::cell_towers();
        let records = vec![
            raw(&schema, &[1, 2, 3, 4], &[1.0, 2.0]),
            raw(&schema, &[1, 3, 3, 4], &[1.5, 2.0]),
        ];
        let meta = meta_for(&schema, &records);
        let result = BlockCursor::new(&schema, &meta, &[0u8; 1]);
        assert!(matches!(result, Err(Error::Corruption { .. })));
    }

    #[test]
    fn test_oversized_block_is_corruption() {
        let schema = Schema::cell_towers();
        let records = vec![
            raw(&schema, &[1, 2, 3, 4], &[1.0, 2.0]),
            raw(&schema, &[1, 3, 3, 4], &[1.5, 2.0]),
        ];
        let mut meta = meta_for(&schema, &records);
        meta.count = 100_000;
        let data = vec![0u8; BLOCK_SIZE];
        let result = BlockCursor::new(&schema, &meta, &data);
        assert!(matches!(result, Err(Error::Corruption { .. })));
    }

    #[test]
    fn test_out_of_bounds_key_is_corruption() {
        let schema = Schema::new(vec![FieldType::Short], vec![FieldType::Byte]);
        let meta = BlockMeta {
            id: 4,
            count: 1,
            key_low: vec![0, 10],
            key_high: vec![0, 20],
            value_low: vec![1],
            value_high: vec![1],
        };
        // stored key suffix 0x30 decodes to 0x0030, above the maximum 0x0014
        let result = decode_block(&schema, &meta, &[0x30]);
        assert!(matches!(result, Err(Error::Corruption { block: 4, .. })));
    }
}
