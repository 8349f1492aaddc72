#![forbid(unsafe_code)]

//! Typed form of the user-editable accessors configuration.
//!
//! Configurations arrive as JSON and are only turned into these types by the
//! schema validator, so a typed [`Accessor`] always carries exactly one step.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::raw::{AttributeKey, RawValue};

pub const LIBRARIES_OF_INTEREST: [&str; 3] = ["pbjs", "googletag", "apstag"];

pub const ACCESSORS_ROOT_KEY: &str = "accessors";
pub const THEN_KEY: &str = "then";

/// Normalized bid fields every library must provide an accessor for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BidField {
    UnitCode,
    Bidder,
    Cpm,
    Currency,
    Won,
}

impl BidField {
    pub const ALL: [BidField; 5] = [
        BidField::UnitCode,
        BidField::Bidder,
        BidField::Cpm,
        BidField::Currency,
        BidField::Won,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BidField::UnitCode => "unitCode",
            BidField::Bidder => "bidder",
            BidField::Cpm => "cpm",
            BidField::Currency => "currency",
            BidField::Won => "won",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessorTag {
    Constant,
    GetAttribute,
    TryGetAttribute,
    CallMethod,
    ApplyFunction,
}

impl AccessorTag {
    pub const ALL: [AccessorTag; 5] = [
        AccessorTag::Constant,
        AccessorTag::GetAttribute,
        AccessorTag::TryGetAttribute,
        AccessorTag::CallMethod,
        AccessorTag::ApplyFunction,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AccessorTag::Constant => "constant",
            AccessorTag::GetAttribute => "getAttribute",
            AccessorTag::TryGetAttribute => "tryGetAttribute",
            AccessorTag::CallMethod => "callMethod",
            AccessorTag::ApplyFunction => "applyFunction",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == raw)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AccessorStep {
    Constant(RawValue),
    GetAttribute(AttributeKey),
    TryGetAttribute(AttributeKey),
    CallMethod(String),
    ApplyFunction(String),
}

impl AccessorStep {
    pub fn tag(&self) -> AccessorTag {
        match self {
            AccessorStep::Constant(_) => AccessorTag::Constant,
            AccessorStep::GetAttribute(_) => AccessorTag::GetAttribute,
            AccessorStep::TryGetAttribute(_) => AccessorTag::TryGetAttribute,
            AccessorStep::CallMethod(_) => AccessorTag::CallMethod,
            AccessorStep::ApplyFunction(_) => AccessorTag::ApplyFunction,
        }
    }

    fn operand_json(&self) -> Value {
        match self {
            AccessorStep::Constant(v) => v.to_json(),
            AccessorStep::GetAttribute(k) | AccessorStep::TryGetAttribute(k) => match k {
                AttributeKey::Index(i) => Value::from(*i),
                AttributeKey::Name(n) => Value::from(n.as_str()),
            },
            AccessorStep::CallMethod(n) | AccessorStep::ApplyFunction(n) => {
                Value::from(n.as_str())
            }
        }
    }
}

/// One extraction step plus an optional continuation fed with its result.
#[derive(Debug, Clone, PartialEq)]
pub struct Accessor {
    pub step: AccessorStep,
    pub then: Option<Box<Accessor>>,
}

impl Accessor {
    pub fn new(step: AccessorStep) -> Self {
        Self { step, then: None }
    }

    pub fn constant(value: impl Into<RawValue>) -> Self {
        Self::new(AccessorStep::Constant(value.into()))
    }

    pub fn get_attribute(key: impl Into<AttributeKey>) -> Self {
        Self::new(AccessorStep::GetAttribute(key.into()))
    }

    pub fn try_get_attribute(key: impl Into<AttributeKey>) -> Self {
        Self::new(AccessorStep::TryGetAttribute(key.into()))
    }

    pub fn call_method(name: impl Into<String>) -> Self {
        Self::new(AccessorStep::CallMethod(name.into()))
    }

    pub fn apply_function(name: impl Into<String>) -> Self {
        Self::new(AccessorStep::ApplyFunction(name.into()))
    }

    /// Appends `next` at the end of this chain.
    pub fn chain(mut self, next: Accessor) -> Self {
        let tail = match self.then.take() {
            Some(existing) => (*existing).chain(next),
            None => next,
        };
        self.then = Some(Box::new(tail));
        self
    }

    pub fn steps(&self) -> impl Iterator<Item = &AccessorStep> {
        std::iter::successors(Some(self), |a| a.then.as_deref()).map(|a| &a.step)
    }

    pub fn depth(&self) -> usize {
        self.steps().count()
    }

    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert(self.step.tag().as_str().to_string(), self.step.operand_json());
        if let Some(next) = &self.then {
            map.insert(THEN_KEY.to_string(), next.to_json());
        }
        Value::Object(map)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldAccessors {
    pub unit_code: Accessor,
    pub bidder: Accessor,
    pub cpm: Accessor,
    pub currency: Accessor,
    pub won: Accessor,
}

impl FieldAccessors {
    pub fn get(&self, field: BidField) -> &Accessor {
        match field {
            BidField::UnitCode => &self.unit_code,
            BidField::Bidder => &self.bidder,
            BidField::Cpm => &self.cpm,
            BidField::Currency => &self.currency,
            BidField::Won => &self.won,
        }
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            BidField::ALL
                .into_iter()
                .map(|f| (f.as_str().to_string(), self.get(f).to_json()))
                .collect(),
        )
    }
}

/// Library name to field accessors. Only ever built from a validated document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccessorsConfig {
    libs: IndexMap<String, FieldAccessors>,
}

impl AccessorsConfig {
    pub fn from_libs(libs: IndexMap<String, FieldAccessors>) -> Self {
        Self { libs }
    }

    pub fn for_lib(&self, lib: &str) -> Option<&FieldAccessors> {
        self.libs.get(lib)
    }

    pub fn libs(&self) -> impl Iterator<Item = &str> {
        self.libs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.libs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libs.is_empty()
    }

    /// The `{ "accessors": {...} }` document this configuration validates from.
    pub fn to_json(&self) -> Value {
        let libs: Map<String, Value> = self
            .libs
            .iter()
            .map(|(lib, fields)| (lib.clone(), fields.to_json()))
            .collect();
        let mut root = Map::new();
        root.insert(ACCESSORS_ROOT_KEY.to_string(), Value::Object(libs));
        Value::Object(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn at_accessor_01_chain_appends_at_tail() {
        let a = Accessor::call_method("getTargetingMap")
            .chain(Accessor::get_attribute("hb_pb"))
            .chain(Accessor::try_get_attribute(0))
            .chain(Accessor::apply_function("parseFloat"));
        assert_eq!(a.depth(), 4);
        assert_eq!(
            a.to_json(),
            json!({
                "callMethod": "getTargetingMap",
                "then": {
                    "getAttribute": "hb_pb",
                    "then": {"tryGetAttribute": 0, "then": {"applyFunction": "parseFloat"}}
                }
            })
        );
    }

    #[test]
    fn at_accessor_02_tag_names_round_trip() {
        for tag in AccessorTag::ALL {
            assert_eq!(AccessorTag::parse(tag.as_str()), Some(tag));
        }
        assert_eq!(AccessorTag::parse("then"), None);
    }
}
