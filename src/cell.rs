//! Cell tower records and identities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reported by platforms for an unavailable field (`i32::MAX`).
pub const UNAVAILABLE: i32 = i32::MAX;

/// Legacy marker for an unknown cell id or area code.
pub const UNKNOWN: i32 = -1;

/// Check if a raw field value denotes "unknown".
pub fn is_sentinel(value: i32) -> bool {
    value == UNAVAILABLE || value == UNKNOWN
}

/// Map a raw optional code to `None` when it is absent or a sentinel.
pub fn normalize(value: Option<i32>) -> Option<i32> {
    value.filter(|v| !is_sentinel(*v))
}

/// A resolved cell tower position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellRecord {
    /// Mobile country code
    pub country: i32,
    /// Mobile network (operator) code
    pub operator: i32,
    /// Cell id
    pub cell: i32,
    /// Location (area) code
    pub area: i32,
    pub longitude: f64,
    pub latitude: f64,
}

impl CellRecord {
    /// A record without a usable cell or area.
    pub fn is_invalid(&self) -> bool {
        is_sentinel(self.cell) && is_sentinel(self.area)
    }
}

impl fmt::Display for CellRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CellRecord(MCC={}, MNC={}, CID={}, LAC={}, lng={}, lat={})",
            self.country, self.operator, self.cell, self.area, self.longitude, self.latitude
        )
    }
}

/// Identity of an observed cell, as reported by the platform.
///
/// Platform-specific cell info types are mapped to this once, at the
/// boundary; the query engine only sees the resolved fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellIdentity {
    Gsm {
        mcc: Option<i32>,
        mnc: Option<i32>,
        lac: i32,
        cid: i32,
    },
    Wcdma {
        mcc: Option<i32>,
        mnc: Option<i32>,
        lac: i32,
        cid: i32,
        psc: Option<i32>,
    },
    Lte {
        mcc: Option<i32>,
        mnc: Option<i32>,
        tac: i32,
        ci: i32,
    },
    Unknown,
}

/// The four lookup fields of a cell identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellQuery {
    pub country: Option<i32>,
    pub operator: Option<i32>,
    pub cell: i32,
    pub area: i32,
}

impl CellIdentity {
    /// The lookup fields, or `None` for an identity that can't be looked up.
    pub fn to_query(&self) -> Option<CellQuery> {
        match *self {
            CellIdentity::Gsm { mcc, mnc, lac, cid }
            | CellIdentity::Wcdma {
                mcc, mnc, lac, cid, ..
            } => Some(CellQuery {
                country: mcc,
                operator: mnc,
                cell: cid,
                area: lac,
            }),
            CellIdentity::Lte { mcc, mnc, tac, ci } => Some(CellQuery {
                country: mcc,
                operator: mnc,
                cell: ci,
                area: tac,
            }),
            CellIdentity::Unknown => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels() {
        assert!(is_sentinel(i32::MAX));
        assert!(is_sentinel(-1));
        assert!(!is_sentinel(0));
        assert!(!is_sentinel(262));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Some(262)), Some(262));
        assert_eq!(normalize(Some(i32::MAX)), None);
        assert_eq!(normalize(Some(-1)), None);
        assert_eq!(normalize(None), None);
    }

    #[test]
    fn test_identity_to_query() {
        let gsm = CellIdentity::Gsm {
            mcc: Some(262),
            mnc: Some(1),
            lac: 100,
            cid: 200,
        };
        assert_eq!(
            gsm.to_query(),
            Some(CellQuery {
                country: Some(262),
                operator: Some(1),
                cell: 200,
                area: 100
            })
        );

        let wcdma = CellIdentity::Wcdma {
            mcc: None,
            mnc: None,
            lac: 5,
            cid: 70000,
            psc: Some(12),
        };
        assert_eq!(wcdma.to_query().map(|q| q.cell), Some(70000));
        assert_eq!(CellIdentity::Unknown.to_query(), None);
    }

    #[test]
    fn test_invalid_record() {
        let record = CellRecord {
            country: 262,
            operator: 1,
            cell: -1,
            area: i32::MAX,
            longitude: 0.0,
            latitude: 0.0,
        };
        assert!(record.is_invalid());
    }

    #[test]
    fn test_record_json() {
        let record = CellRecord {
            country: 262,
            operator: 1,
            cell: 200,
            area: 100,
            longitude: 13.0,
            latitude: 52.0,
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: CellRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
