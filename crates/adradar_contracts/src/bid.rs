#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::{ContractViolation, TimestampMs, Validate};

/// Library-assigned placement code; not guaranteed to match any DOM id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UnitCode(String);

impl UnitCode {
    pub fn new(code: impl Into<String>) -> Result<Self, ContractViolation> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "unit_code",
                reason: "must not be empty",
            });
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UnitCode {
    type Error = ContractViolation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UnitCode> for String {
    fn from(value: UnitCode) -> Self {
        value.0
    }
}

/// Identifier of the on-page element hosting a rendered ad.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SlotId(String);

impl SlotId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "slot_id",
                reason: "must not be empty",
            });
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A slot is always addressable by its own id as a unit code.
    pub fn as_unit_code(&self) -> UnitCode {
        UnitCode(self.0.clone())
    }
}

impl TryFrom<String> for SlotId {
    type Error = ContractViolation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SlotId> for String {
    fn from(value: SlotId) -> Self {
        value.0
    }
}

/// Normalized bid. Immutable apart from `outdated`, which only moves false -> true.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    unit_code: UnitCode,
    bidder: String,
    cpm: f64,
    currency: String,
    won: bool,
    lib: String,
    time: TimestampMs,
    outdated: bool,
}

impl Bid {
    pub fn v1(
        unit_code: UnitCode,
        bidder: String,
        cpm: f64,
        currency: String,
        won: bool,
        lib: String,
        time: TimestampMs,
    ) -> Result<Self, ContractViolation> {
        let b = Self {
            unit_code,
            bidder,
            cpm,
            currency,
            won,
            lib,
            time,
            outdated: false,
        };
        b.validate()?;
        Ok(b)
    }

    pub fn unit_code(&self) -> &UnitCode {
        &self.unit_code
    }

    pub fn bidder(&self) -> &str {
        &self.bidder
    }

    pub fn cpm(&self) -> f64 {
        self.cpm
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn won(&self) -> bool {
        self.won
    }

    pub fn lib(&self) -> &str {
        &self.lib
    }

    pub fn time(&self) -> TimestampMs {
        self.time
    }

    pub fn is_outdated(&self) -> bool {
        self.outdated
    }

    /// Zero-priced bids are retained but never surfaced.
    pub fn is_priced(&self) -> bool {
        self.cpm > 0.0
    }

    pub fn outdated_copy(&self) -> Bid {
        Bid {
            outdated: true,
            ..self.clone()
        }
    }
}

impl Validate for Bid {
    fn validate(&self) -> Result<(), ContractViolation> {
        if !self.cpm.is_finite() {
            return Err(ContractViolation::NotFinite { field: "bid.cpm" });
        }
        if self.cpm < 0.0 {
            return Err(ContractViolation::InvalidValue {
                field: "bid.cpm",
                reason: "must be >= 0",
            });
        }
        if self.bidder.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "bid.bidder",
                reason: "must not be empty",
            });
        }
        if self.currency.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "bid.currency",
                reason: "must not be empty",
            });
        }
        if self.lib.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "bid.lib",
                reason: "must not be empty",
            });
        }
        Ok(())
    }
}

/// One discovery of a slot: the element `id` is reachable through `unit_code`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotLink {
    pub id: SlotId,
    pub unit_code: UnitCode,
}

impl SlotLink {
    pub fn new(id: SlotId, unit_code: UnitCode) -> Self {
        Self { id, unit_code }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bid(cpm: f64) -> Result<Bid, ContractViolation> {
        Bid::v1(
            UnitCode::new("div-gpt-ad-1").unwrap(),
            "appnexus".to_string(),
            cpm,
            "USD".to_string(),
            false,
            "pbjs".to_string(),
            TimestampMs(10),
        )
    }

    #[test]
    fn at_bid_01_rejects_non_finite_cpm() {
        assert_eq!(
            bid(f64::NAN),
            Err(ContractViolation::NotFinite { field: "bid.cpm" })
        );
        assert!(bid(-1.0).is_err());
    }

    #[test]
    fn at_bid_02_outdated_copy_only_flips_flag() {
        let b = bid(1.25).unwrap();
        let o = b.outdated_copy();
        assert!(!b.is_outdated());
        assert!(o.is_outdated());
        assert_eq!(o.cpm(), b.cpm());
        assert_eq!(o.time(), b.time());
        assert!(o.outdated_copy().is_outdated());
    }

    #[test]
    fn at_bid_03_empty_identifiers_rejected() {
        assert!(UnitCode::new("  ").is_err());
        assert!(SlotId::new("").is_err());
        let parsed: Result<SlotLink, _> =
            serde_json::from_str(r#"{"id": "", "unitCode": "u"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn at_bid_04_serializes_camel_case() {
        let v = serde_json::to_value(bid(1.0).unwrap()).unwrap();
        assert_eq!(v["unitCode"], "div-gpt-ad-1");
        assert_eq!(v["outdated"], false);
        assert_eq!(v["time"], 10);
    }
}
