//! Cell tower CSV parser.
//!
//! One record per line: `mcc,mnc,lac,cid,lon,lat`. Text after `#` is a
//! comment, blank lines are skipped and a leading header line is tolerated.

use std::io::{BufRead, BufReader, Read};
use std::str::FromStr;

use crate::cell::CellRecord;
use crate::{Error, Result};

const FIELDS: usize = 6;

/// Cell tower CSV parser.
pub struct CsvParser;

impl CsvParser {
    /// Parse records from a reader.
    pub fn parse<R: Read>(reader: R) -> Result<Vec<CellRecord>> {
        let mut records = Vec::new();
        let buf_reader = BufReader::new(reader);
        let mut seen_content = false;

        for (index, line) in buf_reader.lines().enumerate() {
            let line = line?;
            let number = index + 1;

            // Remove comments
            let line = match line.find('#') {
                Some(idx) => &line[..idx],
                None => line.as_str(),
            };
            let line = line.trim();

            if line.is_empty() {
                continue;
            }

            let first_line = !seen_content;
            seen_content = true;
            if first_line && is_header(line) {
                continue;
            }

            records.push(parse_line(line, number)?);
        }

        Ok(records)
    }

    /// Parse records from a string.
    pub fn parse_str(content: &str) -> Result<Vec<CellRecord>> {
        Self::parse(content.as_bytes())
    }
}

fn is_header(line: &str) -> bool {
    line.split(',')
        .next()
        .map(|field| field.trim().parse::<i64>().is_err())
        .unwrap_or(false)
}

fn parse_line(line: &str, number: usize) -> Result<CellRecord> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != FIELDS {
        return Err(Error::Parse {
            line: number,
            reason: format!("expected {} fields, found {}", FIELDS, fields.len()),
        });
    }

    Ok(CellRecord {
        country: parse_field(fields[0], "mcc", number)?,
        operator: parse_field(fields[1], "mnc", number)?,
        area: parse_field(fields[2], "lac", number)?,
        cell: parse_field(fields[3], "cid", number)?,
        longitude: parse_field(fields[4], "lon", number)?,
        latitude: parse_field(fields[5], "lat", number)?,
    })
}

fn parse_field<T: FromStr>(field: &str, name: &str, number: usize) -> Result<T> {
    field.parse().map_err(|_| Error::Parse {
        line: number,
        reason: format!("invalid {} {:?}", name, field),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_records() {
        let content = r#"
# Berlin
262,1,100,200,13.4050,52.5200
262,2,100,200,13.4051,52.5201   # second operator
"#;
        let records = CsvParser::parse_str(content).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].country, 262);
        assert_eq!(records[0].area, 100);
        assert_eq!(records[0].cell, 200);
        assert_eq!(records[1].operator, 2);
        assert_eq!(records[1].latitude, 52.5201);
    }

    #[test]
    fn test_header_line_skipped() {
        let content = "mcc,mnc,lac,cid,lon,lat\n310,410,7,9,-122.4,37.7\n";
        let records = CsvParser::parse_str(content).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].longitude, -122.4);
    }

    #[test]
    fn test_header_tolerated_only_on_first_line() {
        let content = "310,410,7,9,-122.4,37.7\nmcc,mnc,lac,cid,lon,lat\n";
        assert!(matches!(
            CsvParser::parse_str(content),
            Err(Error::Parse { line: 2, .. })
        ));
    }

    #[test]
    fn test_wrong_field_count() {
        let result = CsvParser::parse_str("262,1,100,200,13.4");
        assert!(matches!(result, Err(Error::Parse { line: 1, .. })));
    }

    #[test]
    fn test_invalid_number() {
        let content = "# towers\n\n262,1,100,abc,13.4,52.5\n";
        match CsvParser::parse_str(content) {
            Err(Error::Parse { line, reason }) => {
                assert_eq!(line, 3);
                assert!(reason.contains("cid"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
