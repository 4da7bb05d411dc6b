//! Cell tower lookup with fallback and caching.
//!
//! The engine resolves a (country, operator, cell, area) identity against a
//! cell tower store, widening the query when the exact identity is absent:
//!
//! 1. Country and operator known: exact lookup. A cell id above `0xFFFF`
//!    is retried once with only its low 16 bits.
//! 2. Operator known without a country: every record of (area, cell) with
//!    a matching operator.
//! 3. Otherwise: every record of (area, cell), or (area, cell, country).
//!
//! An empty step retries with the operator dropped, then the country.
//! Outcomes are cached per distinct query; storage faults are returned to
//! the caller and never cached.

mod config;

pub use config::{Config, QueryEngineConfig, DEFAULT_CACHE_CAPACITY};

use quick_cache::sync::Cache;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::binary::{BlockStoreReader, Entry, FieldValue, Schema};
use crate::cell::{is_sentinel, normalize, CellIdentity, CellRecord};
use crate::{Error, Result};

/// Cell ids above this carry extra bits some platforms include.
const SHORT_CELL_MASK: i32 = 0xFFFF;

/// A normalized query; sentinels are already mapped to `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub country: Option<i32>,
    pub operator: Option<i32>,
    pub cell: i32,
    pub area: i32,
}

impl QueryKey {
    pub fn new(country: Option<i32>, operator: Option<i32>, cell: i32, area: i32) -> Self {
        Self {
            country: normalize(country),
            operator: normalize(operator),
            cell,
            area,
        }
    }

    /// The next, wider query of the cascade.
    fn widen(&self) -> Option<Self> {
        match (self.country, self.operator) {
            (Some(_), Some(_)) => Some(Self {
                operator: None,
                ..*self
            }),
            (Some(_), None) | (None, Some(_)) => Some(Self {
                country: None,
                operator: None,
                ..*self
            }),
            (None, None) => None,
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Capacity of the positive cache.
    pub capacity: usize,
    /// Resolved queries currently cached.
    pub positive_len: usize,
    /// Confirmed misses currently cached.
    pub negative_len: usize,
    /// Queries answered from either cache.
    pub hits: u64,
    /// Queries that went to the store.
    pub misses: u64,
    /// Whether caching is enabled.
    pub enabled: bool,
}

impl CacheStats {
    /// Fraction of queries answered from cache.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Cell tower query engine.
///
/// # Example
///
/// ```ignore
/// use cellstore::QueryEngine;
/// use std::path::Path;
///
/// let engine = QueryEngine::open(Path::new("towers.bcs"))?;
/// for record in engine.query(Some(262), Some(1), 200, 100)?.iter() {
///     println!("{}", record);
/// }
/// ```
pub struct QueryEngine {
    reader: BlockStoreReader,
    /// Resolved, non-empty results.
    positive: Option<Cache<QueryKey, Arc<[CellRecord]>>>,
    /// Queries confirmed to have no match.
    negative: Option<Cache<QueryKey, ()>>,
    config: QueryEngineConfig,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl QueryEngine {
    /// Open a store file with default configuration.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_config(path, QueryEngineConfig::default())
    }

    /// Open a store file with custom configuration.
    pub fn open_with_config(path: &Path, config: QueryEngineConfig) -> Result<Self> {
        let reader = BlockStoreReader::open(path, Schema::cell_towers())?;
        Self::new(reader, config)
    }

    /// Create from store bytes with default configuration.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_bytes_with_config(data, QueryEngineConfig::default())
    }

    /// Create from store bytes with custom configuration.
    pub fn from_bytes_with_config(data: Vec<u8>, config: QueryEngineConfig) -> Result<Self> {
        let reader = BlockStoreReader::from_bytes(data, Schema::cell_towers())?;
        Self::new(reader, config)
    }

    /// Wrap an open reader. The reader must use the cell tower schema.
    pub fn new(reader: BlockStoreReader, config: QueryEngineConfig) -> Result<Self> {
        if *reader.schema() != Schema::cell_towers() {
            return Err(Error::Config(
                "store does not use the cell tower schema".to_string(),
            ));
        }

        let positive = if config.cache_enabled && config.positive_capacity > 0 {
            Some(Cache::new(config.positive_capacity))
        } else {
            None
        };
        let negative = if config.cache_enabled && config.negative_capacity > 0 {
            Some(Cache::new(config.negative_capacity))
        } else {
            None
        };

        Ok(Self {
            reader,
            positive,
            negative,
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Resolve a cell identity to its known positions.
    ///
    /// Returns an empty list when nothing matches after every fallback, or
    /// when `cell` or `area` is a sentinel. Storage faults are returned as
    /// errors.
    pub fn query(
        &self,
        country: Option<i32>,
        operator: Option<i32>,
        cell: i32,
        area: i32,
    ) -> Result<Arc<[CellRecord]>> {
        if is_sentinel(cell) || is_sentinel(area) {
            return Ok(empty());
        }
        let key = QueryKey::new(country, operator, cell, area);

        if let Some(ref negative) = self.negative {
            if negative.get(&key).is_some() {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(empty());
            }
        }
        if let Some(ref positive) = self.positive {
            if let Some(records) = positive.get(&key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(records);
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let records = match self.resolve(key) {
            Ok(records) => records,
            Err(e) => {
                log::warn!("Query {:?} failed: {}", key, e);
                return Err(e);
            }
        };

        if records.is_empty() {
            if let Some(ref negative) = self.negative {
                negative.insert(key, ());
            }
            return Ok(empty());
        }

        let records: Arc<[CellRecord]> = records.into();
        if let Some(ref positive) = self.positive {
            positive.insert(key, Arc::clone(&records));
        }
        Ok(records)
    }

    /// Resolve a cell with no country or operator.
    pub fn query_cell(&self, cell: i32, area: i32) -> Result<Arc<[CellRecord]>> {
        self.query(None, None, cell, area)
    }

    /// Resolve a platform cell identity.
    pub fn query_identity(&self, identity: &CellIdentity) -> Result<Arc<[CellRecord]>> {
        match identity.to_query() {
            Some(q) => self.query(q.country, q.operator, q.cell, q.area),
            None => Ok(empty()),
        }
    }

    /// Uncached cascade: look up, widen on an empty step.
    fn resolve(&self, key: QueryKey) -> Result<Vec<CellRecord>> {
        let mut step = Some(key);
        while let Some(current) = step {
            let records = self.lookup(&current)?;
            if !records.is_empty() {
                return Ok(records);
            }
            step = current.widen();
            if let Some(ref wider) = step {
                log::debug!("No match for {:?}, widening to {:?}", current, wider);
            }
        }
        Ok(Vec::new())
    }

    /// One step of the cascade, without widening.
    fn lookup(&self, key: &QueryKey) -> Result<Vec<CellRecord>> {
        match (key.country, key.operator) {
            (Some(country), Some(operator)) => {
                if let Some(record) = self.exact(country, operator, key.cell, key.area)? {
                    return Ok(vec![record]);
                }
                if key.cell > SHORT_CELL_MASK {
                    let short = key.cell & SHORT_CELL_MASK;
                    log::debug!("Retrying cell {} as {}", key.cell, short);
                    if let Some(record) = self.exact(country, operator, short, key.area)? {
                        return Ok(vec![record]);
                    }
                }
                Ok(Vec::new())
            }
            (None, Some(operator)) => Ok(self
                .prefix(&[FieldValue::Int(key.area), FieldValue::Int(key.cell)])?
                .into_iter()
                .filter(|record| record.operator == operator)
                .collect()),
            (Some(country), None) => self.prefix(&[
                FieldValue::Int(key.area),
                FieldValue::Int(key.cell),
                FieldValue::Int(country),
            ]),
            (None, None) => self.prefix(&[FieldValue::Int(key.area), FieldValue::Int(key.cell)]),
        }
    }

    fn exact(&self, country: i32, operator: i32, cell: i32, area: i32) -> Result<Option<CellRecord>> {
        let key = [
            FieldValue::Int(area),
            FieldValue::Int(cell),
            FieldValue::Int(country),
            FieldValue::Int(operator),
        ];
        Ok(self.reader.get(&key)?.and_then(|value| match value[..] {
            [FieldValue::Double(longitude), FieldValue::Double(latitude)] => Some(CellRecord {
                country,
                operator,
                cell,
                area,
                longitude,
                latitude,
            }),
            _ => None,
        }))
    }

    fn prefix(&self, prefix: &[FieldValue]) -> Result<Vec<CellRecord>> {
        Ok(self
            .reader
            .get_all(prefix)?
            .iter()
            .filter_map(to_record)
            .collect())
    }

    /// Clear both caches.
    pub fn clear_cache(&self) {
        if let Some(ref cache) = self.positive {
            cache.clear();
        }
        if let Some(ref cache) = self.negative {
            cache.clear();
        }
    }

    /// Get cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            capacity: if self.positive.is_some() {
                self.config.positive_capacity
            } else {
                0
            },
            positive_len: self.positive.as_ref().map_or(0, |cache| cache.len()),
            negative_len: self.negative.as_ref().map_or(0, |cache| cache.len()),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            enabled: self.positive.is_some() || self.negative.is_some(),
        }
    }

    /// Get a reference to the underlying reader.
    pub fn reader(&self) -> &BlockStoreReader {
        &self.reader
    }
}

fn empty() -> Arc<[CellRecord]> {
    Arc::from(Vec::new())
}

fn to_record(entry: &Entry) -> Option<CellRecord> {
    match (&entry.key[..], &entry.value[..]) {
        (
            [FieldValue::Int(area), FieldValue::Int(cell), FieldValue::Int(country), FieldValue::Int(operator)],
            [FieldValue::Double(longitude), FieldValue::Double(latitude)],
        ) => Some(CellRecord {
            country: *country,
            operator: *operator,
            cell: *cell,
            area: *area,
            longitude: *longitude,
            latitude: *latitude,
        }),
        _ => None,
    }
}
