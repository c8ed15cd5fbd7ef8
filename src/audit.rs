//! Context hashing for cycle auditability
//!
//! Every cycle report carries the SHA-256 of the snapshot it reasoned
//! over, so a decision can later be matched to its exact inputs.

use crate::models::MarketSnapshot;
use sha2::{Digest, Sha256};
use std::io::Write;

/// Compute SHA256 hash of a snapshot for integrity verification.
/// Streams serialization directly into the hasher, no intermediate String.
pub fn compute_snapshot_hash(snapshot: &MarketSnapshot) -> String {
    let mut hasher = Sha256::new();

    if serde_json::to_writer(&mut HashWriter(&mut hasher), snapshot).is_err() {
        return String::new();
    }

    hex::encode(hasher.finalize())
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SideQuote, TopOfBook};

    fn snapshot(price: f64) -> MarketSnapshot {
        MarketSnapshot {
            market_ticker: "KXBTC15M-T".to_string(),
            current_price: price,
            change_1h_pct: 0.1,
            change_24h_pct: 0.2,
            strike_price: 97_000.0,
            distance_from_strike_pct: 0.25,
            minutes_to_expiry: 9.0,
            book: TopOfBook {
                yes: SideQuote { bid_cents: 50.0, ask_cents: 54.0 },
                no: SideQuote { bid_cents: 46.0, ask_cents: 50.0 },
            },
            yes_depth: vec![],
            no_depth: vec![],
        }
    }

    #[test]
    fn test_hash_is_stable_and_input_sensitive() {
        let a = compute_snapshot_hash(&snapshot(97_250.0));
        let b = compute_snapshot_hash(&snapshot(97_250.0));
        let c = compute_snapshot_hash(&snapshot(97_251.0));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
