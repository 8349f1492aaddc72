#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::bid::SlotLink;
use crate::raw::RawValue;
use crate::TimestampMs;

/// Event produced by an instrumented library, already demultiplexed by content type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "content", rename_all = "lowercase")]
pub enum PageEvent {
    Bid {
        lib: String,
        time: TimestampMs,
        bid: RawValue,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hostname: Option<String>,
    },
    Slot {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lib: Option<String>,
        slot: SlotLink,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hostname: Option<String>,
    },
}

impl PageEvent {
    /// Host of the page the event was observed on, when the sender stamped it.
    pub fn hostname(&self) -> Option<&str> {
        match self {
            PageEvent::Bid { hostname, .. } | PageEvent::Slot { hostname, .. } => {
                hostname.as_deref()
            }
        }
    }
}
