//! Snapshot codec
//!
//! A snapshot is a JSON array with one record per active resting order:
//!
//! ```json
//! [
//!   { "id": "O1", "side": "BUY", "price": 100.0, "quantity": 10,
//!     "timestamp": 1722300000000, "expiry": 1722300060000 }
//! ]
//! ```
//!
//! `expiry` may be absent or `0`, both meaning "no expiry". Reading a
//! snapshot parses and validates every record before anything is returned,
//! so callers can apply the result all-or-nothing.

use common::{OrderId, Side, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::domain::{is_valid_order_id, Order};
use crate::error::MatchingError;
use crate::Result;

/// One persisted resting order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub id: OrderId,
    pub side: Side,
    pub price: f64,
    pub quantity: u64,
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<Timestamp>,
}

impl SnapshotRecord {
    /// Capture a resting order
    pub fn from_order(order: &Order) -> Self {
        Self {
            id: order.order_id.clone(),
            side: order.side,
            price: order.price,
            quantity: order.quantity,
            timestamp: order.timestamp,
            expiry: order.expiry,
        }
    }

    /// Rebuild an active limit order
    pub fn into_order(self) -> Order {
        let order = Order::limit(self.id, self.side, self.price, self.quantity, self.timestamp);
        match self.expiry.filter(|&expiry| expiry != 0) {
            Some(expiry) => order.with_expiry(expiry),
            None => order,
        }
    }

    fn validate(&self, position: usize) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(MatchingError::parse(format!("record {}: empty id", position)));
        }
        if !is_valid_order_id(&self.id) {
            return Err(MatchingError::parse(format!(
                "record {}: id {:?} contains a comma, quote or control character",
                position, self.id
            )));
        }
        if self.quantity == 0 {
            return Err(MatchingError::parse(format!(
                "record {} ({}): quantity must be positive",
                position, self.id
            )));
        }
        if !self.price.is_finite() {
            return Err(MatchingError::parse(format!(
                "record {} ({}): price is not finite",
                position, self.id
            )));
        }
        Ok(())
    }
}

/// Serialize records to the snapshot JSON text
pub fn encode(records: &[SnapshotRecord]) -> Result<String> {
    serde_json::to_string_pretty(records).map_err(|e| MatchingError::parse(e.to_string()))
}

/// Parse and validate snapshot JSON text
pub fn decode(content: &str) -> Result<Vec<SnapshotRecord>> {
    let records: Vec<SnapshotRecord> =
        serde_json::from_str(content).map_err(|e| MatchingError::parse(e.to_string()))?;

    let mut seen = HashSet::with_capacity(records.len());
    for (position, record) in records.iter().enumerate() {
        record.validate(position)?;
        if !seen.insert(record.id.as_str()) {
            return Err(MatchingError::parse(format!(
                "record {}: duplicate id {}",
                position, record.id
            )));
        }
    }

    Ok(records)
}

/// Write a snapshot file
///
/// The content goes to a sibling temporary file first and is renamed into
/// place, so a failed write never leaves a truncated snapshot behind.
pub fn write_snapshot<P: AsRef<Path>>(path: P, records: &[SnapshotRecord]) -> Result<()> {
    let path = path.as_ref();
    let json = encode(records)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| MatchingError::io(parent, e))?;
    }

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|e| MatchingError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| MatchingError::io(path, e))?;

    info!(path = %path.display(), orders = records.len(), "Snapshot written");
    Ok(())
}

/// Read and validate a snapshot file
pub fn read_snapshot<P: AsRef<Path>>(path: P) -> Result<Vec<SnapshotRecord>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| MatchingError::io(path, e))?;
    debug!(path = %path.display(), bytes = content.len(), "Snapshot read");

    decode(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::path::PathBuf;
    use uuid::Uuid;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("lobx-snapshot-{}", Uuid::new_v4()))
            .join(name)
    }

    #[test]
    fn test_record_field_names() {
        let record = SnapshotRecord::from_order(
            &Order::limit("id1", Side::Buy, 100.0, 10, 1_000).with_expiry(2_000),
        );
        let value: serde_json::Value = serde_json::from_str(&encode(&[record]).unwrap()).unwrap();

        assert_eq!(value[0]["id"], "id1");
        assert_eq!(value[0]["side"], "BUY");
        assert_eq!(value[0]["price"], 100.0);
        assert_eq!(value[0]["quantity"], 10);
        assert_eq!(value[0]["timestamp"], 1_000);
        assert_eq!(value[0]["expiry"], 2_000);
    }

    #[test]
    fn test_missing_expiry_is_omitted() {
        let record = SnapshotRecord::from_order(&Order::limit("id1", Side::Sell, 105.0, 5, 1));
        let json = encode(&[record]).unwrap();
        assert!(!json.contains("expiry"));
    }

    #[test]
    fn test_zero_expiry_means_none() {
        let records =
            decode(r#"[{"id":"a","side":"SELL","price":1.5,"quantity":2,"timestamp":3,"expiry":0}]"#)
                .unwrap();
        let order = records.into_iter().next().unwrap().into_order();
        assert_eq!(order.expiry, None);
        assert!(order.is_active());
    }

    #[test]
    fn test_decode_rejects_malformed_json() {
        assert_matches!(decode("{ this is not valid json "), Err(MatchingError::Parse(_)));
    }

    #[test]
    fn test_decode_rejects_bad_records() {
        // unknown side
        assert_matches!(
            decode(r#"[{"id":"a","side":"HOLD","price":1,"quantity":1,"timestamp":0}]"#),
            Err(MatchingError::Parse(_))
        );
        // negative quantity
        assert_matches!(
            decode(r#"[{"id":"a","side":"BUY","price":1,"quantity":-1,"timestamp":0}]"#),
            Err(MatchingError::Parse(_))
        );
        // zero quantity
        assert_matches!(
            decode(r#"[{"id":"a","side":"BUY","price":1,"quantity":0,"timestamp":0}]"#),
            Err(MatchingError::Parse(_))
        );
        // id that would corrupt the ledger
        assert_matches!(
            decode(r#"[{"id":"a,b","side":"BUY","price":1,"quantity":1,"timestamp":0}]"#),
            Err(MatchingError::Parse(_))
        );
        // missing field
        assert_matches!(
            decode(r#"[{"id":"a","side":"BUY","quantity":1,"timestamp":0}]"#),
            Err(MatchingError::Parse(_))
        );
    }

    #[test]
    fn test_decode_rejects_duplicate_ids() {
        let json = r#"[
            {"id":"a","side":"BUY","price":1,"quantity":1,"timestamp":0},
            {"id":"a","side":"BUY","price":2,"quantity":1,"timestamp":0}
        ]"#;
        assert_matches!(decode(json), Err(MatchingError::Parse(msg)) if msg.contains("duplicate"));
    }

    #[test]
    fn test_write_then_read_file() {
        let path = temp_path("book.json");
        let records = vec![
            SnapshotRecord::from_order(&Order::limit("id1", Side::Buy, 100.0, 10, 1)),
            SnapshotRecord::from_order(&Order::limit("id2", Side::Sell, 105.0, 5, 2).with_expiry(9)),
        ];

        write_snapshot(&path, &records).unwrap();
        assert_eq!(read_snapshot(&path).unwrap(), records);

        fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        let path = temp_path("does_not_exist.json");
        assert_matches!(read_snapshot(&path), Err(MatchingError::Io { .. }));
    }
}
