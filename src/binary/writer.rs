//! Block store file writer.
//!
//! Readers never modify a store; this builder produces new files from a set
//! of records, for tooling and tests.

use std::fs;
use std::path::Path;

use super::block::BlockLayout;
use super::format::*;
use crate::{Error, Result};

/// Per-field minima and maxima of a run of records.
#[derive(Debug, Clone)]
struct Bounds {
    key_low: Vec<u8>,
    key_high: Vec<u8>,
    value_low: Vec<u8>,
    value_high: Vec<u8>,
}

impl Bounds {
    fn new(key: &[u8], value: &[u8]) -> Self {
        Self {
            key_low: key.to_vec(),
            key_high: key.to_vec(),
            value_low: value.to_vec(),
            value_high: value.to_vec(),
        }
    }

    fn include(&mut self, schema: &Schema, key: &[u8], value: &[u8]) {
        widen(&mut self.key_low, &mut self.key_high, key, &schema.key_widths());
        widen(
            &mut self.value_low,
            &mut self.value_high,
            value,
            &schema.value_widths(),
        );
    }

    fn layout(&self, schema: &Schema) -> BlockLayout {
        BlockLayout::from_bounds(
            schema,
            &self.key_low,
            &self.key_high,
            &self.value_low,
            &self.value_high,
        )
    }

    fn into_meta(self, id: u32, count: u32) -> BlockMeta {
        BlockMeta {
            id,
            count,
            key_low: self.key_low,
            key_high: self.key_high,
            value_low: self.value_low,
            value_high: self.value_high,
        }
    }
}

fn widen(low: &mut [u8], high: &mut [u8], raw: &[u8], widths: &[usize]) {
    let mut offset = 0;
    for &width in widths {
        let range = offset..offset + width;
        if raw[range.clone()] < low[range.clone()] {
            low[range.clone()].copy_from_slice(&raw[range.clone()]);
        }
        if raw[range.clone()] > high[range.clone()] {
            high[range.clone()].copy_from_slice(&raw[range]);
        }
        offset += width;
    }
}

/// Block store file writer.
pub struct BlockStoreWriter {
    schema: Schema,
    records: Vec<(Vec<u8>, Vec<u8>)>,
    max_block_records: Option<usize>,
}

impl BlockStoreWriter {
    /// Create a new writer for the given schema.
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            records: Vec::new(),
            max_block_records: None,
        }
    }

    /// Limit the number of records per block (in addition to the 4KB limit).
    pub fn with_max_block_records(mut self, max: usize) -> Self {
        self.max_block_records = Some(max.max(1));
        self
    }

    /// Add a record.
    pub fn add(&mut self, key: &[FieldValue], value: &[FieldValue]) -> Result<()> {
        let key = self.schema.encode_key(key, false)?;
        let value = self.schema.encode_value(value)?;
        self.records.push((key, value));
        Ok(())
    }

    /// Number of records added so far.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if no records were added.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Build the file contents.
    pub fn build(&mut self) -> Result<Vec<u8>> {
        self.records.sort_by(|a, b| a.0.cmp(&b.0));
        if self.records.windows(2).any(|w| w[0].0 == w[1].0) {
            return Err(Error::DuplicateKey);
        }

        let blocks = self.pack();
        let block_count = blocks.len() as u32;

        let data_start = self.schema.data_start(block_count) as usize;
        let mut output = Vec::with_capacity(data_start + blocks.len() * BLOCK_SIZE);

        // Header and metadata table
        output.extend_from_slice(&(block_count as i32).to_be_bytes());
        for (meta, _) in &blocks {
            output.extend_from_slice(&meta.to_bytes());
        }
        output.resize(data_start, 0);

        // Data blocks, each padded to a full block
        for (_, payload) in &blocks {
            output.extend_from_slice(payload);
            output.resize(output.len() + BLOCK_SIZE - payload.len(), 0);
        }

        log::debug!(
            "Built store: {} records in {} blocks ({} bytes)",
            self.records.len(),
            block_count,
            output.len()
        );

        Ok(output)
    }

    /// Build the file and write it to `path`.
    pub fn write_to(&mut self, path: &Path) -> Result<()> {
        let data = self.build()?;
        fs::write(path, data)?;
        Ok(())
    }

    /// Greedily slice the sorted records into blocks whose payload fits.
    fn pack(&self) -> Vec<(BlockMeta, Vec<u8>)> {
        let limit = self.max_block_records.unwrap_or(usize::MAX);
        let mut blocks = Vec::new();
        let mut start = 0;

        while start < self.records.len() {
            let (key, value) = &self.records[start];
            let mut bounds = Bounds::new(key, value);
            let mut end = start + 1;

            while end < self.records.len() && end - start < limit {
                let (key, value) = &self.records[end];
                let mut candidate = bounds.clone();
                candidate.include(&self.schema, key, value);
                let count = (end - start + 1) as u32;
                if candidate.layout(&self.schema).payload_len(count) > BLOCK_SIZE {
                    break;
                }
                bounds = candidate;
                end += 1;
            }

            let layout = bounds.layout(&self.schema);
            let count = (end - start) as u32;
            let mut payload = Vec::with_capacity(layout.payload_len(count));
            for (key, value) in &self.records[start..end] {
                layout.encode_record(key, value, &mut payload);
            }

            blocks.push((bounds.into_meta(blocks.len() as u32, count), payload));
            start = end;
        }

        blocks
    }
}
