#![forbid(unsafe_code)]

pub mod logging;
pub mod replay_cli;
