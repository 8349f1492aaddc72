#![forbid(unsafe_code)]

use crate::ledger::{InMemoryWonBidLedger, StorageError, WonBidId, WonBidInput, WonBidRow};

/// Typed repository interface for won-bid persistence.
pub trait WonBidRepo {
    fn append_won_bid(&mut self, input: WonBidInput) -> Result<WonBidId, StorageError>;
    fn won_bid_rows(&self) -> &[WonBidRow];
    fn won_bid_rows_by_lib(&self, lib: &str) -> Vec<&WonBidRow>;
    fn won_bid_rows_by_hostname(&self, hostname: &str) -> Vec<&WonBidRow>;
    fn attempt_overwrite_won_bid(&mut self, won_bid_id: WonBidId) -> Result<(), StorageError>;
}

impl WonBidRepo for InMemoryWonBidLedger {
    fn append_won_bid(&mut self, input: WonBidInput) -> Result<WonBidId, StorageError> {
        self.append(input)
    }

    fn won_bid_rows(&self) -> &[WonBidRow] {
        self.rows()
    }

    fn won_bid_rows_by_lib(&self, lib: &str) -> Vec<&WonBidRow> {
        self.rows().iter().filter(|r| r.bid.lib() == lib).collect()
    }

    fn won_bid_rows_by_hostname(&self, hostname: &str) -> Vec<&WonBidRow> {
        self.rows()
            .iter()
            .filter(|r| r.hostname.as_deref() == Some(hostname))
            .collect()
    }

    fn attempt_overwrite_won_bid(&mut self, won_bid_id: WonBidId) -> Result<(), StorageError> {
        self.attempt_overwrite(won_bid_id)
    }
}
