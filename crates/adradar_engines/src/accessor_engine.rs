#![forbid(unsafe_code)]

//! Interpreter for accessor chains over raw library objects.

use std::borrow::Cow;
use std::fmt;

use adradar_contracts::accessor::{Accessor, AccessorStep, AccessorTag, BidField, FieldAccessors};
use adradar_contracts::bid::{Bid, UnitCode};
use adradar_contracts::raw::{AttributeKey, RawValue};
use adradar_contracts::{ContractViolation, TimestampMs};

use crate::functions::FunctionRegistry;

#[derive(Debug, Clone, PartialEq)]
pub enum AccessErrorReason {
    NullInput,
    MissingAttribute,
    NotCallable { found: &'static str },
    UnknownFunction,
    FunctionFailed(&'static str),
}

/// One step of a chain could not be applied. `step` is the zero-based depth.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessError {
    pub step: usize,
    pub accessor: AccessorTag,
    pub operand: String,
    pub reason: AccessErrorReason,
}

impl fmt::Display for AccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "step {} ({} {:?}): ",
            self.step,
            self.accessor.as_str(),
            self.operand
        )?;
        match &self.reason {
            AccessErrorReason::NullInput => write!(f, "input is null"),
            AccessErrorReason::MissingAttribute => write!(f, "attribute is missing"),
            AccessErrorReason::NotCallable { found } => write!(f, "member is a {found}, not callable"),
            AccessErrorReason::UnknownFunction => write!(f, "function is not registered"),
            AccessErrorReason::FunctionFailed(why) => write!(f, "{why}"),
        }
    }
}

impl std::error::Error for AccessError {}

/// Outcome of one field extraction, kept positionally in [`ExtractedFields`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOutcome {
    Value(RawValue),
    Null,
    Failed(AccessError),
}

impl FieldOutcome {
    fn from_result(result: Result<RawValue, AccessError>) -> Self {
        match result {
            Ok(RawValue::Null) => FieldOutcome::Null,
            Ok(v) => FieldOutcome::Value(v),
            Err(e) => FieldOutcome::Failed(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFields {
    outcomes: [(BidField, FieldOutcome); 5],
}

/// Why an extracted record did not become a [`Bid`].
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionDrop {
    UnknownLibrary(String),
    /// `cpm` is not a positive number. Expected for unpriced events; not an error.
    Unpriced,
    FieldFailed {
        field: BidField,
        error: AccessError,
    },
    FieldNull {
        field: BidField,
    },
    WrongType {
        field: BidField,
        expected: &'static str,
        found: &'static str,
    },
    Contract(ContractViolation),
}

impl fmt::Display for ExtractionDrop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownLibrary(lib) => write!(f, "no accessors configured for library {lib}"),
            Self::Unpriced => write!(f, "cpm is not a positive number"),
            Self::FieldFailed { field, error } => write!(f, "{}: {error}", field.as_str()),
            Self::FieldNull { field } => write!(f, "{}: extracted null", field.as_str()),
            Self::WrongType {
                field,
                expected,
                found,
            } => write!(f, "{}: expected {expected}, found {found}", field.as_str()),
            Self::Contract(v) => write!(f, "{v}"),
        }
    }
}

impl std::error::Error for ExtractionDrop {}

impl From<ContractViolation> for ExtractionDrop {
    fn from(v: ContractViolation) -> Self {
        ExtractionDrop::Contract(v)
    }
}

impl ExtractedFields {
    pub fn get(&self, field: BidField) -> &FieldOutcome {
        // BidField::ALL order is the storage order.
        &self.outcomes[field as usize].1
    }

    pub fn iter(&self) -> impl Iterator<Item = (BidField, &FieldOutcome)> {
        self.outcomes.iter().map(|(f, o)| (*f, o))
    }

    fn value(&self, field: BidField) -> Result<&RawValue, ExtractionDrop> {
        match self.get(field) {
            FieldOutcome::Value(v) => Ok(v),
            FieldOutcome::Null => Err(ExtractionDrop::FieldNull { field }),
            FieldOutcome::Failed(error) => Err(ExtractionDrop::FieldFailed {
                field,
                error: error.clone(),
            }),
        }
    }

    fn string(&self, field: BidField) -> Result<String, ExtractionDrop> {
        let v = self.value(field)?;
        v.as_str()
            .map(str::to_string)
            .ok_or(ExtractionDrop::WrongType {
                field,
                expected: "string",
                found: v.type_name(),
            })
    }

    /// Promotes the record to a [`Bid`]; unpriced records are reported first.
    pub fn into_bid(self, lib: &str, time: TimestampMs) -> Result<Bid, ExtractionDrop> {
        let cpm = match self.get(BidField::Cpm) {
            FieldOutcome::Value(RawValue::Number(n)) if n.is_finite() && *n > 0.0 => *n,
            _ => return Err(ExtractionDrop::Unpriced),
        };
        let unit_code = UnitCode::new(self.string(BidField::UnitCode)?)?;
        let bidder = self.string(BidField::Bidder)?;
        let currency = self.string(BidField::Currency)?;
        let won_raw = self.value(BidField::Won)?;
        let won = won_raw.as_bool().ok_or(ExtractionDrop::WrongType {
            field: BidField::Won,
            expected: "boolean",
            found: won_raw.type_name(),
        })?;
        Ok(Bid::v1(
            unit_code,
            bidder,
            cpm,
            currency,
            won,
            lib.to_string(),
            time,
        )?)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AccessorEngine {
    registry: FunctionRegistry,
}

impl AccessorEngine {
    pub fn new(registry: FunctionRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Pure function of `(input, accessor, registry)`.
    ///
    /// A `tryGetAttribute` step that finds nothing ends the chain with null;
    /// the steps after it do not run.
    pub fn access(&self, input: &RawValue, accessor: &Accessor) -> Result<RawValue, AccessError> {
        let mut current: Cow<'_, RawValue> = Cow::Borrowed(input);
        for (step, s) in accessor.steps().enumerate() {
            let fail = |reason: AccessErrorReason| AccessError {
                step,
                accessor: s.tag(),
                operand: operand_label(s),
                reason,
            };
            let next = match s {
                AccessorStep::Constant(v) => v.clone(),
                AccessorStep::GetAttribute(key) => {
                    if current.is_null() {
                        return Err(fail(AccessErrorReason::NullInput));
                    }
                    current
                        .get(key)
                        .cloned()
                        .ok_or_else(|| fail(AccessErrorReason::MissingAttribute))?
                }
                AccessorStep::TryGetAttribute(key) => match current.get(key) {
                    Some(v) if !v.is_null() => v.clone(),
                    _ => return Ok(RawValue::Null),
                },
                AccessorStep::CallMethod(name) => {
                    if current.is_null() {
                        return Err(fail(AccessErrorReason::NullInput));
                    }
                    match current.get_name(name) {
                        Some(RawValue::Method(m)) => m.call(),
                        Some(other) => {
                            return Err(fail(AccessErrorReason::NotCallable {
                                found: other.type_name(),
                            }))
                        }
                        None => return Err(fail(AccessErrorReason::MissingAttribute)),
                    }
                }
                AccessorStep::ApplyFunction(name) => match self.registry.apply(name, &current) {
                    Some(Ok(v)) => v,
                    Some(Err(why)) => return Err(fail(AccessErrorReason::FunctionFailed(why))),
                    None => return Err(fail(AccessErrorReason::UnknownFunction)),
                },
            };
            current = Cow::Owned(next);
        }
        Ok(current.into_owned())
    }

    /// Runs every required field accessor; failures stay with their field.
    pub fn access_all(&self, input: &RawValue, fields: &FieldAccessors) -> ExtractedFields {
        let outcomes = BidField::ALL
            .map(|field| (field, FieldOutcome::from_result(self.access(input, fields.get(field)))));
        ExtractedFields { outcomes }
    }

    pub fn extract_bid(
        &self,
        lib: &str,
        fields: &FieldAccessors,
        input: &RawValue,
        time: TimestampMs,
    ) -> Result<Bid, ExtractionDrop> {
        let extracted = self.access_all(input, fields);
        for (field, outcome) in extracted.iter() {
            if let FieldOutcome::Failed(e) = outcome {
                tracing::debug!(lib, field = field.as_str(), error = %e, "field extraction failed");
            }
        }
        extracted.into_bid(lib, time)
    }
}

fn operand_label(step: &AccessorStep) -> String {
    match step {
        AccessorStep::Constant(_) => String::new(),
        AccessorStep::GetAttribute(k) | AccessorStep::TryGetAttribute(k) => match k {
            AttributeKey::Index(i) => i.to_string(),
            AttributeKey::Name(n) => n.clone(),
        },
        AccessorStep::CallMethod(n) | AccessorStep::ApplyFunction(n) => n.clone(),
    }
}
