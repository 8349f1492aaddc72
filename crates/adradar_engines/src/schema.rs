#![forbid(unsafe_code)]

//! Validation of user-edited accessors documents.
//!
//! A document is either accepted whole, as a typed [`AccessorsConfig`], or
//! rejected with every violation found. Nothing is partially applied.

use std::fmt;

use adradar_contracts::accessor::{
    Accessor, AccessorStep, AccessorTag, AccessorsConfig, BidField, FieldAccessors,
    ACCESSORS_ROOT_KEY, LIBRARIES_OF_INTEREST, THEN_KEY,
};
use adradar_contracts::raw::{AttributeKey, RawValue};
use indexmap::IndexMap;
use serde_json::Value;

use crate::functions::FunctionRegistry;

pub const MAX_CHAIN_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    pub path: String,
    pub reason: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaReport {
    violations: Vec<SchemaViolation>,
}

impl SchemaReport {
    pub fn violations(&self) -> &[SchemaViolation] {
        &self.violations
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn mentions(&self, path: &str) -> bool {
        self.violations.iter().any(|v| v.path == path)
    }
}

impl fmt::Display for SchemaReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SchemaReport {}

/// Human-readable violations of `document`; empty when it is valid.
pub fn validate(document: &Value, registry: &FunctionRegistry) -> Vec<SchemaViolation> {
    let mut v = Validator {
        registry,
        violations: Vec::new(),
    };
    v.document(document);
    v.violations
}

pub fn parse_accessors(
    document: &Value,
    registry: &FunctionRegistry,
) -> Result<AccessorsConfig, SchemaReport> {
    let mut v = Validator {
        registry,
        violations: Vec::new(),
    };
    match v.document(document) {
        Some(config) if v.violations.is_empty() => Ok(config),
        _ => Err(SchemaReport {
            violations: v.violations,
        }),
    }
}

pub fn parse_accessors_json(
    text: &str,
    registry: &FunctionRegistry,
) -> Result<AccessorsConfig, SchemaReport> {
    let document: Value = serde_json::from_str(text).map_err(|e| SchemaReport {
        violations: vec![SchemaViolation {
            path: "$".to_string(),
            reason: format!("not valid JSON: {e}"),
        }],
    })?;
    parse_accessors(&document, registry)
}

struct Validator<'a> {
    registry: &'a FunctionRegistry,
    violations: Vec<SchemaViolation>,
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl Validator<'_> {
    fn violation(&mut self, path: &str, reason: impl Into<String>) {
        self.violations.push(SchemaViolation {
            path: path.to_string(),
            reason: reason.into(),
        });
    }

    fn document(&mut self, document: &Value) -> Option<AccessorsConfig> {
        let Some(root) = document.as_object() else {
            self.violation("$", format!("must be an object, found {}", json_type(document)));
            return None;
        };
        let Some(libs_value) = root.get(ACCESSORS_ROOT_KEY) else {
            self.violation(ACCESSORS_ROOT_KEY, "is required");
            return None;
        };
        let Some(libs) = libs_value.as_object() else {
            self.violation(
                ACCESSORS_ROOT_KEY,
                format!("must be an object, found {}", json_type(libs_value)),
            );
            return None;
        };

        for lib in LIBRARIES_OF_INTEREST {
            if !libs.contains_key(lib) {
                self.violation(&format!("{ACCESSORS_ROOT_KEY}.{lib}"), "is required");
            }
        }

        let mut parsed = IndexMap::new();
        let mut complete = true;
        for (lib, fields) in libs {
            let path = format!("{ACCESSORS_ROOT_KEY}.{lib}");
            match self.fields(&path, fields) {
                Some(f) => {
                    parsed.insert(lib.clone(), f);
                }
                None => complete = false,
            }
        }
        complete.then(|| AccessorsConfig::from_libs(parsed))
    }

    fn fields(&mut self, path: &str, value: &Value) -> Option<FieldAccessors> {
        let Some(map) = value.as_object() else {
            self.violation(path, format!("must be an object, found {}", json_type(value)));
            return None;
        };
        let field = |this: &mut Self, f: BidField| {
            let field_path = format!("{path}.{}", f.as_str());
            match map.get(f.as_str()) {
                Some(node) => this.accessor(&field_path, node, 0),
                None => {
                    this.violation(&field_path, "is required");
                    None
                }
            }
        };
        let unit_code = field(self, BidField::UnitCode);
        let bidder = field(self, BidField::Bidder);
        let cpm = field(self, BidField::Cpm);
        let currency = field(self, BidField::Currency);
        let won = field(self, BidField::Won);
        Some(FieldAccessors {
            unit_code: unit_code?,
            bidder: bidder?,
            cpm: cpm?,
            currency: currency?,
            won: won?,
        })
    }

    fn accessor(&mut self, path: &str, node: &Value, depth: usize) -> Option<Accessor> {
        if depth >= MAX_CHAIN_DEPTH {
            self.violation(path, format!("chain exceeds {MAX_CHAIN_DEPTH} steps"));
            return None;
        }
        let Some(map) = node.as_object() else {
            self.violation(
                path,
                format!("must be an accessor object, found {}", json_type(node)),
            );
            return None;
        };

        let mut tags = Vec::new();
        for key in map.keys() {
            match AccessorTag::parse(key) {
                Some(tag) => tags.push(tag),
                None if key == THEN_KEY => {}
                None => self.violation(path, format!("unknown property {key:?}")),
            }
        }
        let step = match tags.as_slice() {
            [tag] => {
                let operand = map.get(tag.as_str()).unwrap_or(&Value::Null);
                self.step(path, *tag, operand)
            }
            [] => {
                self.violation(path, "must set exactly one accessor, found none");
                None
            }
            many => {
                let names: Vec<&str> = many.iter().map(|t| t.as_str()).collect();
                self.violation(
                    path,
                    format!("must set exactly one accessor, found {}", names.join(", ")),
                );
                None
            }
        };

        let then = match map.get(THEN_KEY) {
            Some(next) => Some(self.accessor(&format!("{path}.{THEN_KEY}"), next, depth + 1)),
            None => None,
        };

        let mut accessor = Accessor::new(step?);
        if let Some(next) = then {
            accessor.then = Some(Box::new(next?));
        }
        Some(accessor)
    }

    fn step(&mut self, path: &str, tag: AccessorTag, operand: &Value) -> Option<AccessorStep> {
        let key = |v: &Value| match v {
            Value::String(s) => Some(AttributeKey::Name(s.clone())),
            Value::Number(n) => n
                .as_u64()
                .and_then(|i| usize::try_from(i).ok())
                .map(AttributeKey::Index),
            _ => None,
        };
        match tag {
            AccessorTag::Constant => Some(AccessorStep::Constant(RawValue::from_json(operand))),
            AccessorTag::GetAttribute | AccessorTag::TryGetAttribute => match key(operand) {
                Some(k) if tag == AccessorTag::GetAttribute => Some(AccessorStep::GetAttribute(k)),
                Some(k) => Some(AccessorStep::TryGetAttribute(k)),
                None => {
                    self.violation(
                        path,
                        format!(
                            "{} must be a string or a non-negative integer",
                            tag.as_str()
                        ),
                    );
                    None
                }
            },
            AccessorTag::CallMethod => match operand.as_str() {
                Some(name) if !name.is_empty() => Some(AccessorStep::CallMethod(name.to_string())),
                _ => {
                    self.violation(path, "callMethod must be a non-empty string");
                    None
                }
            },
            AccessorTag::ApplyFunction => match operand.as_str() {
                Some(name) if self.registry.contains(name) => {
                    Some(AccessorStep::ApplyFunction(name.to_string()))
                }
                Some(name) => {
                    self.violation(path, format!("unknown function {name:?}"));
                    None
                }
                None => {
                    self.violation(path, "applyFunction must be a string");
                    None
                }
            },
        }
    }
}
