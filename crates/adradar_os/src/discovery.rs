#![forbid(unsafe_code)]

use adradar_contracts::raw::RawValue;
use adradar_contracts::TimestampMs;
use adradar_engines::accessor_engine::AccessorEngine;
use adradar_engines::locator::{LibraryLocator, LibraryNotFoundError, LocatedLibrary, NotFoundReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryConfig {
    pub poll_interval_ms: u64,
    /// Libraries still missing this long after page load are given up on.
    pub stop_after_load_ms: u64,
}

impl DiscoveryConfig {
    pub fn mvp_v1() -> Self {
        Self {
            poll_interval_ms: 2,
            stop_after_load_ms: 2_000,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self::mvp_v1()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveryTick {
    pub found: Vec<LocatedLibrary>,
    pub not_found: Vec<LibraryNotFoundError>,
}

impl DiscoveryTick {
    pub fn is_empty(&self) -> bool {
        self.found.is_empty() && self.not_found.is_empty()
    }
}

/// Polls for libraries that load asynchronously with the page.
///
/// Each locator is retried on every tick until it matches or the deadline
/// after page load passes. Giving up is an ordinary outcome, reported once
/// per library.
#[derive(Debug, Clone)]
pub struct DiscoveryPoller {
    config: DiscoveryConfig,
    pending: Vec<LibraryLocator>,
    last_poll: Option<TimestampMs>,
    deadline: Option<TimestampMs>,
}

impl DiscoveryPoller {
    pub fn new(config: DiscoveryConfig, locators: Vec<LibraryLocator>) -> Self {
        Self {
            config,
            pending: locators,
            last_poll: None,
            deadline: None,
        }
    }

    /// Starts the stop countdown. Later calls keep the first deadline.
    pub fn page_loaded(&mut self, now: TimestampMs) {
        if self.deadline.is_none() {
            self.deadline = Some(TimestampMs(
                now.0.saturating_add(self.config.stop_after_load_ms),
            ));
        }
    }

    pub fn pending_libs(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(|l| l.lib())
    }

    pub fn is_finished(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn poll(
        &mut self,
        now: TimestampMs,
        engine: &AccessorEngine,
        globals: &RawValue,
    ) -> DiscoveryTick {
        let mut tick = DiscoveryTick::default();
        if self.pending.is_empty() {
            return tick;
        }

        if matches!(self.deadline, Some(deadline) if now >= deadline) {
            for locator in self.pending.drain(..) {
                tracing::info!(lib = locator.lib(), "stopped searching for library");
                tick.not_found.push(LibraryNotFoundError {
                    lib: locator.lib().to_string(),
                    reason: NotFoundReason::DiscoveryTimedOut,
                });
            }
            return tick;
        }

        if let Some(last) = self.last_poll {
            if now.millis_since(last) < self.config.poll_interval_ms {
                return tick;
            }
        }
        self.last_poll = Some(now);

        let mut still_pending = Vec::with_capacity(self.pending.len());
        for locator in self.pending.drain(..) {
            match locator.locate(engine, globals) {
                Ok(found) => {
                    tracing::info!(lib = %found.lib, binding = %found.binding, "found library");
                    tick.found.push(found);
                }
                Err(e) => {
                    tracing::trace!(error = %e, "library not located yet");
                    still_pending.push(locator);
                }
            }
        }
        self.pending = still_pending;
        tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adradar_engines::locator::default_locators;
    use serde_json::json;

    fn poller() -> DiscoveryPoller {
        DiscoveryPoller::new(DiscoveryConfig::mvp_v1(), default_locators().unwrap())
    }

    fn with_pbjs() -> RawValue {
        RawValue::from_json(&json!({
            "pbjs": {"getBidResponses": {"$returns": {}}, "getAllWinningBids": {"$returns": []}}
        }))
    }

    #[test]
    fn at_discovery_01_late_library_is_found_on_a_later_tick() {
        let engine = AccessorEngine::default();
        let mut p = poller();
        assert!(p.poll(TimestampMs(0), &engine, &RawValue::from_json(&json!({}))).is_empty());
        let tick = p.poll(TimestampMs(10), &engine, &with_pbjs());
        assert_eq!(tick.found.len(), 1);
        assert_eq!(tick.found[0].lib, "pbjs");
        assert_eq!(p.pending_libs().collect::<Vec<_>>(), vec!["googletag", "apstag"]);
    }

    #[test]
    fn at_discovery_02_polls_respect_interval() {
        let engine = AccessorEngine::default();
        let mut p = poller();
        p.poll(TimestampMs(100), &engine, &RawValue::Null);
        assert!(p.poll(TimestampMs(101), &engine, &with_pbjs()).found.is_empty());
        assert_eq!(p.poll(TimestampMs(102), &engine, &with_pbjs()).found.len(), 1);
    }

    #[test]
    fn at_discovery_03_deadline_reports_missing_libraries_once() {
        let engine = AccessorEngine::default();
        let mut p = poller();
        p.poll(TimestampMs(0), &engine, &with_pbjs());
        p.page_loaded(TimestampMs(500));
        p.page_loaded(TimestampMs(900));
        assert!(p.poll(TimestampMs(2_499), &engine, &RawValue::Null).not_found.is_empty());
        let tick = p.poll(TimestampMs(2_500), &engine, &RawValue::Null);
        assert_eq!(tick.not_found.len(), 2);
        assert!(tick
            .not_found
            .iter()
            .all(|e| e.reason == NotFoundReason::DiscoveryTimedOut));
        assert!(p.is_finished());
        assert!(p.poll(TimestampMs(3_000), &engine, &RawValue::Null).is_empty());
    }
}
