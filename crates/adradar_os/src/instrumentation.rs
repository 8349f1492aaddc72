#![forbid(unsafe_code)]

use std::collections::VecDeque;

use adradar_contracts::event::PageEvent;
use adradar_engines::locator::LocatedLibrary;

/// Hooks into a located library and reports what it observes as page events.
///
/// `attach` returns whatever the library already knows (bids that arrived
/// before it was found); `poll` drains what has happened since.
pub trait Instrumentation {
    fn lib(&self) -> &str;
    fn attach(&mut self, library: &LocatedLibrary) -> Vec<PageEvent>;
    fn poll(&mut self) -> Vec<PageEvent>;
}

/// Instrumentation that replays a fixed event script. Used by the replay
/// tool and by tests in place of a live page.
#[derive(Debug, Clone)]
pub struct RecordedInstrumentation {
    lib: String,
    backlog: Vec<PageEvent>,
    queued: VecDeque<PageEvent>,
    attached_binding: Option<String>,
}

impl RecordedInstrumentation {
    pub fn new(lib: impl Into<String>, backlog: Vec<PageEvent>) -> Self {
        Self {
            lib: lib.into(),
            backlog,
            queued: VecDeque::new(),
            attached_binding: None,
        }
    }

    pub fn push(&mut self, event: PageEvent) {
        self.queued.push_back(event);
    }

    pub fn attached_binding(&self) -> Option<&str> {
        self.attached_binding.as_deref()
    }
}

impl Instrumentation for RecordedInstrumentation {
    fn lib(&self) -> &str {
        &self.lib
    }

    fn attach(&mut self, library: &LocatedLibrary) -> Vec<PageEvent> {
        if self.attached_binding.is_some() {
            return Vec::new();
        }
        self.attached_binding = Some(library.binding.clone());
        std::mem::take(&mut self.backlog)
    }

    fn poll(&mut self) -> Vec<PageEvent> {
        if self.attached_binding.is_none() {
            return Vec::new();
        }
        self.queued.drain(..).collect()
    }
}
