//! Import of cell tower data into store files.

mod csv;

pub use csv::CsvParser;

use std::collections::HashSet;

use crate::binary::{BlockStoreWriter, FieldValue, Schema};
use crate::cell::CellRecord;
use crate::Result;

/// Build a cell tower store from records.
///
/// Records with a repeated (area, cell, country, operator) identity are
/// dropped; the first occurrence is kept.
pub fn build_store(records: &[CellRecord]) -> Result<Vec<u8>> {
    let mut writer = BlockStoreWriter::new(Schema::cell_towers());
    let mut seen = HashSet::new();
    let mut duplicates = 0usize;

    for record in records {
        if !seen.insert((record.area, record.cell, record.country, record.operator)) {
            duplicates += 1;
            continue;
        }
        writer.add(
            &[
                FieldValue::Int(record.area),
                FieldValue::Int(record.cell),
                FieldValue::Int(record.country),
                FieldValue::Int(record.operator),
            ],
            &[
                FieldValue::Double(record.longitude),
                FieldValue::Double(record.latitude),
            ],
        )?;
    }

    if duplicates > 0 {
        log::warn!("Skipped {} duplicate cell records", duplicates);
    }

    writer.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryEngine;

    #[test]
    fn test_build_store_from_csv() {
        let content = "262,1,100,200,13.4,52.5\n262,1,100,200,0.0,0.0\n262,2,100,200,13.5,52.6\n";
        let records = CsvParser::parse_str(content).unwrap();
        let data = build_store(&records).unwrap();

        let engine = QueryEngine::from_bytes(data).unwrap();
        let found = engine.query(Some(262), Some(1), 200, 100).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].longitude, 13.4);
        assert_eq!(engine.query_cell(200, 100).unwrap().len(), 2);
    }
}
