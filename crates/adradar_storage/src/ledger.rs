#![forbid(unsafe_code)]

use std::fmt;

use adradar_contracts::bid::Bid;
use adradar_contracts::raw::RawValue;
use adradar_contracts::{ContractViolation, Validate};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct WonBidId(pub u64);

/// A won bid plus what is needed to analyze it later: the page it was seen
/// on and a plain-data snapshot of the library object it was extracted from.
#[derive(Debug, Clone, PartialEq)]
pub struct WonBidInput {
    pub bid: Bid,
    pub hostname: Option<String>,
    pub original: RawValue,
}

impl WonBidInput {
    pub fn v1(
        bid: Bid,
        hostname: Option<String>,
        original: RawValue,
    ) -> Result<Self, ContractViolation> {
        let input = Self {
            bid,
            hostname,
            original,
        };
        input.validate()?;
        Ok(input)
    }
}

impl Validate for WonBidInput {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.bid.validate()?;
        if !self.bid.won() {
            return Err(ContractViolation::InvalidValue {
                field: "won_bid.bid.won",
                reason: "must be true",
            });
        }
        if matches!(self.hostname.as_deref(), Some(h) if h.trim().is_empty()) {
            return Err(ContractViolation::InvalidValue {
                field: "won_bid.hostname",
                reason: "must not be empty when present",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WonBidRow {
    pub won_bid_id: WonBidId,
    pub bid: Bid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub original: RawValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    AppendOnlyViolation { table: &'static str },
    ContractViolation(ContractViolation),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AppendOnlyViolation { table } => write!(f, "{table} is append-only"),
            Self::ContractViolation(v) => write!(f, "contract violation: {v}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<ContractViolation> for StorageError {
    fn from(v: ContractViolation) -> Self {
        StorageError::ContractViolation(v)
    }
}

/// Flat append-only list of winning bids, kept for later analysis.
#[derive(Debug)]
pub struct InMemoryWonBidLedger {
    rows: Vec<WonBidRow>,
    next_won_bid_id: u64,
}

impl Default for InMemoryWonBidLedger {
    fn default() -> Self {
        Self::new_in_memory()
    }
}

impl InMemoryWonBidLedger {
    pub fn new_in_memory() -> Self {
        Self {
            rows: Vec::new(),
            next_won_bid_id: 1,
        }
    }

    pub(crate) fn append(&mut self, input: WonBidInput) -> Result<WonBidId, StorageError> {
        input.validate()?;
        let id = WonBidId(self.next_won_bid_id);
        self.next_won_bid_id = self.next_won_bid_id.saturating_add(1);
        self.rows.push(WonBidRow {
            won_bid_id: id,
            bid: input.bid,
            hostname: input.hostname,
            original: input.original,
        });
        Ok(id)
    }

    pub fn rows(&self) -> &[WonBidRow] {
        &self.rows
    }

    pub fn attempt_overwrite(&mut self, _won_bid_id: WonBidId) -> Result<(), StorageError> {
        Err(StorageError::AppendOnlyViolation { table: "won_bids" })
    }
}
