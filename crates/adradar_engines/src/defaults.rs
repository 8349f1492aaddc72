#![forbid(unsafe_code)]

//! Built-in accessors for the supported ad libraries.

use adradar_contracts::accessor::{Accessor, AccessorsConfig, FieldAccessors};
use indexmap::IndexMap;

fn path(first: Accessor, rest: impl IntoIterator<Item = Accessor>) -> Accessor {
    rest.into_iter().fold(first, Accessor::chain)
}

/// Prebid bid objects carry flat fields; `won` is stamped on by the instrumentation.
pub fn pbjs_accessors() -> FieldAccessors {
    FieldAccessors {
        unit_code: Accessor::get_attribute("adUnitCode"),
        bidder: Accessor::get_attribute("bidder"),
        cpm: Accessor::get_attribute("cpm"),
        currency: Accessor::get_attribute("currency"),
        won: Accessor::get_attribute("won"),
    }
}

/// GPT slots expose the header-bidding winner through their targeting map.
pub fn googletag_accessors() -> FieldAccessors {
    FieldAccessors {
        unit_code: path(
            Accessor::call_method("getSlotId"),
            [Accessor::call_method("getId")],
        ),
        bidder: path(
            Accessor::call_method("getTargetingMap"),
            [
                Accessor::get_attribute("hb_bidder"),
                Accessor::try_get_attribute(0),
            ],
        ),
        cpm: path(
            Accessor::call_method("getTargetingMap"),
            [
                Accessor::get_attribute("hb_pb"),
                Accessor::try_get_attribute(0),
                Accessor::apply_function("parseFloat"),
            ],
        ),
        currency: Accessor::constant("USD"),
        won: Accessor::constant(true),
    }
}

pub fn apstag_accessors() -> FieldAccessors {
    let kv = |key: &str| {
        path(
            Accessor::get_attribute("bid"),
            [
                Accessor::get_attribute("kvMap"),
                Accessor::get_attribute(key),
                Accessor::get_attribute(0),
            ],
        )
    };
    FieldAccessors {
        unit_code: kv("amznp"),
        bidder: kv("hb_bidder"),
        cpm: kv("hb_pb").chain(Accessor::apply_function("parseFloat")),
        currency: Accessor::constant("USD"),
        won: Accessor::constant(true),
    }
}

pub fn default_accessors() -> AccessorsConfig {
    let mut libs = IndexMap::new();
    libs.insert("pbjs".to_string(), pbjs_accessors());
    libs.insert("googletag".to_string(), googletag_accessors());
    libs.insert("apstag".to_string(), apstag_accessors());
    AccessorsConfig::from_libs(libs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::FunctionRegistry;
    use crate::schema::parse_accessors;

    #[test]
    fn at_defaults_01_builtin_document_passes_validation() {
        let config = default_accessors();
        let reparsed = parse_accessors(&config.to_json(), &FunctionRegistry::standard_v1());
        assert_eq!(reparsed, Ok(config));
    }

    #[test]
    fn at_defaults_02_apstag_cpm_parses_last() {
        assert_eq!(apstag_accessors().cpm.depth(), 5);
        assert_eq!(googletag_accessors().bidder.depth(), 3);
    }
}
