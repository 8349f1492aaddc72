#![forbid(unsafe_code)]

//! Best-effort discovery of ad libraries among a page's global bindings.
//!
//! A library is recognized by a binding name pattern plus a structural shape:
//! every shape accessor must resolve to a non-null value against the candidate.

use std::fmt;

use adradar_contracts::accessor::Accessor;
use adradar_contracts::raw::RawValue;
use regex::Regex;

use crate::accessor_engine::AccessorEngine;

#[derive(Debug, Clone)]
pub struct LibraryLocator {
    lib: String,
    name_pattern: Regex,
    shape: Vec<Accessor>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocatedLibrary {
    pub lib: String,
    /// Name of the global binding the library was found under.
    pub binding: String,
    pub handle: RawValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotFoundReason {
    NoMatchingBinding,
    ShapeMismatch { candidates: usize },
    DiscoveryTimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryNotFoundError {
    pub lib: String,
    pub reason: NotFoundReason,
}

impl fmt::Display for LibraryNotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            NotFoundReason::NoMatchingBinding => write!(f, "{} not found: no matching binding", self.lib),
            NotFoundReason::ShapeMismatch { candidates } => write!(
                f,
                "{} not found: {candidates} binding(s) matched by name but not by shape",
                self.lib
            ),
            NotFoundReason::DiscoveryTimedOut => {
                write!(f, "{} not found before discovery stopped", self.lib)
            }
        }
    }
}

impl std::error::Error for LibraryNotFoundError {}

impl LibraryLocator {
    pub fn new(
        lib: impl Into<String>,
        name_pattern: &str,
        shape: Vec<Accessor>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            lib: lib.into(),
            name_pattern: Regex::new(name_pattern)?,
            shape,
        })
    }

    /// Matches any binding whose name contains `lib`, e.g. `pbjs` or `my_pbjs_2`.
    pub fn containing_name(lib: &str, shape: Vec<Accessor>) -> Result<Self, regex::Error> {
        Self::new(lib, &format!(r"^\S*{}\S*$", regex::escape(lib)), shape)
    }

    pub fn lib(&self) -> &str {
        &self.lib
    }

    pub fn matches_name(&self, binding: &str) -> bool {
        self.name_pattern.is_match(binding)
    }

    pub fn matches_shape(&self, engine: &AccessorEngine, candidate: &RawValue) -> bool {
        self.shape
            .iter()
            .all(|a| matches!(engine.access(candidate, a), Ok(v) if !v.is_null()))
    }

    /// First binding, in enumeration order, matching both name and shape.
    pub fn locate(
        &self,
        engine: &AccessorEngine,
        globals: &RawValue,
    ) -> Result<LocatedLibrary, LibraryNotFoundError> {
        let mut candidates = 0usize;
        for (name, value) in globals.members() {
            if !self.matches_name(name) {
                continue;
            }
            candidates += 1;
            if self.matches_shape(engine, value) {
                return Ok(LocatedLibrary {
                    lib: self.lib.clone(),
                    binding: name.to_string(),
                    handle: value.clone(),
                });
            }
        }
        let reason = if candidates == 0 {
            NotFoundReason::NoMatchingBinding
        } else {
            NotFoundReason::ShapeMismatch { candidates }
        };
        Err(LibraryNotFoundError {
            lib: self.lib.clone(),
            reason,
        })
    }
}

pub fn default_locators() -> Result<Vec<LibraryLocator>, regex::Error> {
    Ok(vec![
        LibraryLocator::containing_name(
            "pbjs",
            vec![
                Accessor::get_attribute("getBidResponses"),
                Accessor::get_attribute("getAllWinningBids"),
            ],
        )?,
        LibraryLocator::containing_name(
            "googletag",
            vec![Accessor::call_method("pubads").chain(Accessor::get_attribute("getSlots"))],
        )?,
        LibraryLocator::containing_name(
            "apstag",
            vec![Accessor::get_attribute("_getSlotIdToNameMapping")],
        )?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn globals() -> RawValue {
        RawValue::from_json(&json!({
            "document": {},
            "pbjsChunk": [],
            "my_pbjs": {
                "getBidResponses": {"$returns": {}},
                "getAllWinningBids": {"$returns": []}
            },
            "googletag": {"pubads": {"$returns": {"getSlots": {"$returns": []}}}},
            "apstag": {"init": {"$returns": null}}
        }))
    }

    fn locator(lib: &str) -> LibraryLocator {
        default_locators()
            .unwrap()
            .into_iter()
            .find(|l| l.lib() == lib)
            .unwrap()
    }

    #[test]
    fn at_locator_01_name_and_shape_must_both_match() {
        let found = locator("pbjs")
            .locate(&AccessorEngine::default(), &globals())
            .unwrap();
        assert_eq!(found.binding, "my_pbjs");
    }

    #[test]
    fn at_locator_02_shape_through_method_call() {
        let found = locator("googletag")
            .locate(&AccessorEngine::default(), &globals())
            .unwrap();
        assert_eq!(found.binding, "googletag");
    }

    #[test]
    fn at_locator_03_shape_mismatch_is_reported() {
        let err = locator("apstag")
            .locate(&AccessorEngine::default(), &globals())
            .unwrap_err();
        assert_eq!(err.reason, NotFoundReason::ShapeMismatch { candidates: 1 });
    }

    #[test]
    fn at_locator_04_no_binding_is_reported() {
        let err = locator("pbjs")
            .locate(&AccessorEngine::default(), &RawValue::object([("window", RawValue::Null)]))
            .unwrap_err();
        assert_eq!(err.reason, NotFoundReason::NoMatchingBinding);
    }
}
