#![forbid(unsafe_code)]

pub mod discovery;
pub mod instrumentation;
pub mod page_session;
