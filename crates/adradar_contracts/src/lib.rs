#![forbid(unsafe_code)]

pub mod accessor;
pub mod bid;
pub mod common;
pub mod display;
pub mod event;
pub mod raw;

pub use common::{ContractViolation, TimestampMs, Validate};
