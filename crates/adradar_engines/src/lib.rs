#![forbid(unsafe_code)]

pub mod accessor_engine;
pub mod aggregator;
pub mod collection_map;
pub mod defaults;
pub mod display;
pub mod functions;
pub mod locator;
pub mod schema;
