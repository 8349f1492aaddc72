#![forbid(unsafe_code)]

use serde::Serialize;

use crate::bid::Bid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayKind {
    /// A winning bid is known; its price was paid.
    Winning,
    /// Only non-winning bids are known; the price is at least this much.
    LowerBound,
    NoInformation,
}

/// Logical classification of a slot. Recomputed on every query, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    Unknown,
    Linked,
    Priced,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotDisplay {
    pub kind: DisplayKind,
    pub text: String,
    pub priced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bid: Option<Bid>,
}
