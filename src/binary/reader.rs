//! Block store reader.

use byteorder::{BigEndian, ReadBytesExt};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use super::block::{decode_block, BlockCursor, BlockLayout};
use super::format::*;
use crate::{Error, Result};

/// Inclusive range of block indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub first: u32,
    pub last: u32,
}

impl BlockRange {
    fn single(block: u32) -> Self {
        Self {
            first: block,
            last: block,
        }
    }
}

/// A decoded record.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: Vec<FieldValue>,
    pub value: Vec<FieldValue>,
}

/// Result of a whole-file verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyReport {
    /// Blocks checked
    pub blocks: u32,
    /// Records decoded
    pub records: u64,
}

/// Reader for block store files.
///
/// The reader keeps one file handle. Every physical read (a metadata entry
/// or a block payload) is a seek plus a read under the handle's lock; search
/// and decoding run outside the lock, so concurrent lookups interleave at
/// read granularity. Metadata is read on demand and not cached.
pub struct BlockStoreReader {
    file: Mutex<File>,
    schema: Schema,
    block_count: u32,
    reads: AtomicU64,
}

impl BlockStoreReader {
    /// Open a store file.
    pub fn open(path: &Path, schema: Schema) -> Result<Self> {
        let file = File::open(path)?;
        let reader = Self::from_file(file, schema)?;
        log::info!(
            "Opened store {:?}: {} blocks",
            path,
            reader.block_count
        );
        Ok(reader)
    }

    /// Open a store from bytes.
    ///
    /// This writes the data to a temp file and then opens it.
    pub fn from_bytes(data: Vec<u8>, schema: Schema) -> Result<Self> {
        let mut temp_file = tempfile::tempfile()?;
        temp_file.write_all(&data)?;
        Self::from_file(temp_file, schema)
    }

    fn from_file(mut file: File, schema: Schema) -> Result<Self> {
        let len = file.metadata()?.len();
        if len < HEADER_SIZE as u64 {
            return Err(Error::InvalidHeaderSize {
                expected: HEADER_SIZE as u64,
                actual: len,
            });
        }

        file.seek(SeekFrom::Start(0))?;
        let count = file.read_i32::<BigEndian>()?;
        if count < 0 {
            return Err(Error::InvalidBlockCount(count));
        }
        let block_count = count as u32;

        let table_end = schema.meta_offset(block_count);
        if len < table_end {
            return Err(Error::InvalidHeaderSize {
                expected: table_end,
                actual: len,
            });
        }

        Ok(Self {
            file: Mutex::new(file),
            schema,
            block_count,
            reads: AtomicU64::new(1),
        })
    }

    /// Number of data blocks.
    pub fn block_count(&self) -> u32 {
        self.block_count
    }

    /// The store's schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Number of physical reads issued against the file so far, including
    /// the header read at open.
    pub fn physical_reads(&self) -> u64 {
        self.reads.load(AtomicOrdering::Relaxed)
    }

    /// One physical read: seek and fill `buf` under the file lock.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(buf)?;
        }
        self.reads.fetch_add(1, AtomicOrdering::Relaxed);
        Ok(())
    }

    /// Read the metadata of one block.
    pub fn block_meta(&self, block: u32) -> Result<BlockMeta> {
        if block >= self.block_count {
            return Err(Error::BlockOutOfRange {
                block,
                count: self.block_count,
            });
        }
        let mut raw = vec![0u8; self.schema.meta_entry_size()];
        self.read_at(self.schema.meta_offset(block), &mut raw)?;
        BlockMeta::parse(&self.schema, block, &raw)
    }

    /// Read the stored payload of a block.
    fn read_block(&self, meta: &BlockMeta) -> Result<Vec<u8>> {
        let len = BlockLayout::new(&self.schema, meta).payload_len(meta.count);
        if len > BLOCK_SIZE {
            return Err(Error::Corruption {
                block: meta.id,
                reason: format!("{} records need {} bytes", meta.count, len),
            });
        }
        let mut data = vec![0u8; len];
        if len > 0 {
            self.read_at(self.schema.block_offset(self.block_count, meta.id), &mut data)?;
        }
        Ok(data)
    }

    /// Find the blocks whose key bounds may hold `key`, a raw full key or
    /// key prefix, searching the whole file.
    pub fn search(&self, key: &[u8]) -> Result<Option<BlockRange>> {
        if self.block_count == 0 {
            return Ok(None);
        }
        let range = self.find_block_range(key, 0, self.block_count - 1)?;
        log::trace!("Block range for {:?}: {:?}", key, range);
        Ok(range)
    }

    /// Range search over blocks `low..=high`.
    ///
    /// Returns the first and last block whose bounds may contain `key`, or
    /// `None` when `key` lies outside the bounds of the whole slice. A key
    /// prefix can legitimately span several blocks.
    pub fn find_block_range(&self, key: &[u8], low: u32, high: u32) -> Result<Option<BlockRange>> {
        if low > high {
            return Ok(None);
        }

        let low_meta = self.block_meta(low)?;
        if compare_prefix(&low_meta.key_low, key) == Ordering::Greater {
            return Ok(None);
        }
        if low == high {
            if compare_prefix(&low_meta.key_high, key) == Ordering::Less {
                return Ok(None);
            }
            return Ok(Some(BlockRange::single(low)));
        }

        let high_meta = self.block_meta(high)?;
        if compare_prefix(&high_meta.key_high, key) == Ordering::Less {
            return Ok(None);
        }

        let low_reaches = compare_prefix(&low_meta.key_high, key);
        let high_starts = compare_prefix(&high_meta.key_low, key);

        if high - low == 1 {
            let in_low = low_reaches != Ordering::Less;
            let in_high = high_starts != Ordering::Greater;
            return Ok(match (in_low, in_high) {
                (true, true) => Some(BlockRange { first: low, last: high }),
                (true, false) => Some(BlockRange::single(low)),
                (false, true) => Some(BlockRange::single(high)),
                (false, false) => None,
            });
        }

        // Both ends sit exactly on the key: everything in between matches too.
        if low_reaches == Ordering::Equal && high_starts == Ordering::Equal {
            return Ok(Some(BlockRange { first: low, last: high }));
        }

        let mid = low + (high - low) / 2;
        let mid_meta = self.block_meta(mid)?;

        if compare_prefix(&mid_meta.key_low, key) == Ordering::Greater {
            return self.find_block_range(key, low, mid - 1);
        }
        if compare_prefix(&mid_meta.key_high, key) == Ordering::Less {
            return self.find_block_range(key, mid + 1, high);
        }

        // mid is part of the answer; find the true first and last block.
        let first = self
            .find_block_range(key, low, mid)?
            .map_or(mid, |range| range.first);
        let last = self
            .find_block_range(key, mid, high)?
            .map_or(mid, |range| range.last);
        Ok(Some(BlockRange { first, last }))
    }

    /// Point lookup of a full key.
    pub fn get(&self, key: &[FieldValue]) -> Result<Option<Vec<FieldValue>>> {
        let raw = self.schema.encode_key(key, false)?;
        Ok(self
            .get_raw(&raw)?
            .map(|value| self.schema.decode_value(&value)))
    }

    /// Point lookup of a raw, encoded full key.
    pub fn get_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if key.len() != self.schema.key_width() {
            return Err(Error::MalformedKey(format!(
                "raw key is {} bytes, expected {}",
                key.len(),
                self.schema.key_width()
            )));
        }
        let range = match self.search(key)? {
            Some(range) => range,
            None => return Ok(None),
        };

        for block in range.first..=range.last {
            let meta = self.block_meta(block)?;
            let data = self.read_block(&meta)?;
            let mut cursor = BlockCursor::new(&self.schema, &meta, &data)?;
            while cursor.advance()? {
                match cursor.key().cmp(key) {
                    Ordering::Less => continue,
                    Ordering::Equal => return Ok(Some(cursor.take_value()?)),
                    Ordering::Greater => return Ok(None),
                }
            }
        }

        Ok(None)
    }

    /// All records whose leading key fields equal `prefix`.
    pub fn get_all(&self, prefix: &[FieldValue]) -> Result<Vec<Entry>> {
        let raw = self.schema.encode_key(prefix, true)?;
        Ok(self
            .get_all_raw(&raw)?
            .into_iter()
            .map(|(key, value)| Entry {
                key: self.schema.decode_key(&key),
                value: self.schema.decode_value(&value),
            })
            .collect())
    }

    /// All raw records whose key starts with the raw `prefix`.
    pub fn get_all_raw(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut entries = Vec::new();
        let range = match self.search(prefix)? {
            Some(range) => range,
            None => return Ok(entries),
        };

        'blocks: for block in range.first..=range.last {
            let meta = self.block_meta(block)?;
            let data = self.read_block(&meta)?;
            let mut cursor = BlockCursor::new(&self.schema, &meta, &data)?;
            while cursor.advance()? {
                match compare_prefix(cursor.key(), prefix) {
                    Ordering::Less => continue,
                    Ordering::Equal => {
                        let key = cursor.key().to_vec();
                        entries.push((key, cursor.take_value()?));
                    }
                    // Sorted order: nothing later can match.
                    Ordering::Greater => break 'blocks,
                }
            }
        }

        Ok(entries)
    }

    /// Decode every record of one block.
    pub fn block_entries(&self, block: u32) -> Result<Vec<Entry>> {
        let meta = self.block_meta(block)?;
        let data = self.read_block(&meta)?;
        Ok(decode_block(&self.schema, &meta, &data)?
            .into_iter()
            .map(|(key, value)| Entry {
                key: self.schema.decode_key(&key),
                value: self.schema.decode_value(&value),
            })
            .collect())
    }

    /// Total number of records, summed over all metadata entries.
    pub fn record_count(&self) -> Result<u64> {
        let mut total = 0u64;
        for block in 0..self.block_count {
            total += self.block_meta(block)?.count as u64;
        }
        Ok(total)
    }

    /// Decode the whole file and check that every record lies within its
    /// block's bounds and that keys strictly increase across the file.
    pub fn verify(&self) -> Result<VerifyReport> {
        let mut previous: Option<Vec<u8>> = None;
        let mut records = 0u64;

        for block in 0..self.block_count {
            let meta = self.block_meta(block)?;
            let data = self.read_block(&meta)?;
            for (key, _) in decode_block(&self.schema, &meta, &data)? {
                if let Some(prev) = &previous {
                    if *prev >= key {
                        return Err(Error::Corruption {
                            block,
                            reason: "keys out of order".to_string(),
                        });
                    }
                }
                previous = Some(key);
                records += 1;
            }
        }

        Ok(VerifyReport {
            blocks: self.block_count,
            records,
        })
    }
}
