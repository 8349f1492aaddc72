#![forbid(unsafe_code)]

use adradar_contracts::accessor::AccessorsConfig;
use adradar_contracts::bid::{SlotId, SlotLink};
use adradar_contracts::display::SlotDisplay;
use adradar_contracts::event::PageEvent;
use adradar_contracts::raw::{RawValue, SNAPSHOT_MAX_DEPTH};
use adradar_contracts::TimestampMs;
use adradar_engines::accessor_engine::{AccessorEngine, ExtractionDrop};
use adradar_engines::aggregator::{AggregatorConfig, BidAggregator};
use adradar_engines::defaults::default_accessors;
use adradar_engines::locator::{LibraryLocator, LibraryNotFoundError};
use adradar_engines::schema::{parse_accessors, parse_accessors_json, SchemaReport};
use adradar_storage::ledger::{WonBidId, WonBidInput};
use adradar_storage::repo::WonBidRepo;
use serde_json::Value;

use crate::discovery::{DiscoveryConfig, DiscoveryPoller};
use crate::instrumentation::Instrumentation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageSessionConfig {
    pub aggregator: AggregatorConfig,
    pub discovery: DiscoveryConfig,
}

impl PageSessionConfig {
    pub fn mvp_v1() -> Self {
        Self {
            aggregator: AggregatorConfig::mvp_v1(),
            discovery: DiscoveryConfig::mvp_v1(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    Ingested,
    Dropped(ExtractionDrop),
}

/// What the page overlay must redraw after one event.
#[derive(Debug, Clone, PartialEq)]
pub struct PageUpdate {
    pub outcome: EventOutcome,
    pub displays: Vec<(SlotId, SlotDisplay)>,
    pub number_of_ads: usize,
    pub won_bid_id: Option<WonBidId>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub attached: Vec<String>,
    pub not_found: Vec<LibraryNotFoundError>,
    pub updates: Vec<PageUpdate>,
}

/// One page's worth of observation: the active accessors, the aggregated
/// bids and slots, and the won-bid ledger they feed.
pub struct PageSession<R>
where
    R: WonBidRepo,
{
    config: PageSessionConfig,
    engine: AccessorEngine,
    accessors: AccessorsConfig,
    aggregator: BidAggregator,
    repo: R,
    discovery: Option<DiscoveryPoller>,
    instrumentations: Vec<(Box<dyn Instrumentation>, bool)>,
}

impl<R> PageSession<R>
where
    R: WonBidRepo,
{
    pub fn new(
        config: PageSessionConfig,
        engine: AccessorEngine,
        accessors: AccessorsConfig,
        repo: R,
    ) -> Self {
        Self {
            config,
            engine,
            accessors,
            aggregator: BidAggregator::new(config.aggregator),
            repo,
            discovery: None,
            instrumentations: Vec::new(),
        }
    }

    pub fn with_default_accessors(repo: R) -> Self {
        Self::new(
            PageSessionConfig::mvp_v1(),
            AccessorEngine::default(),
            default_accessors(),
            repo,
        )
    }

    pub fn config(&self) -> PageSessionConfig {
        self.config
    }

    pub fn accessors(&self) -> &AccessorsConfig {
        &self.accessors
    }

    pub fn aggregator(&self) -> &BidAggregator {
        &self.aggregator
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn into_repo(self) -> R {
        self.repo
    }

    /// Validates a candidate configuration without touching the active one.
    pub fn propose_accessors(&self, document: &Value) -> Result<AccessorsConfig, SchemaReport> {
        parse_accessors(document, self.engine.registry()).inspect_err(|report| {
            tracing::warn!(violations = report.len(), "rejected accessors configuration");
        })
    }

    pub fn propose_accessors_json(&self, text: &str) -> Result<AccessorsConfig, SchemaReport> {
        parse_accessors_json(text, self.engine.registry()).inspect_err(|report| {
            tracing::warn!(violations = report.len(), "rejected accessors configuration");
        })
    }

    pub fn apply_accessors(&mut self, accessors: AccessorsConfig) {
        tracing::info!(libs = accessors.len(), "applied accessors configuration");
        self.accessors = accessors;
    }

    /// Forgets every bid and slot. The ledger and accessors are kept.
    pub fn reset(&mut self) {
        self.aggregator.reset();
        tracing::debug!("page session reset");
    }

    pub fn resolve_display(&self, id: &SlotId) -> SlotDisplay {
        self.aggregator.resolve_display(id)
    }

    pub fn handle(&mut self, event: &PageEvent) -> PageUpdate {
        match event {
            PageEvent::Bid {
                lib,
                time,
                bid,
                hostname,
            } => self.handle_bid(lib, *time, bid, hostname.as_deref()),
            PageEvent::Slot { slot, .. } => self.handle_slot(slot),
        }
    }

    pub fn handle_bid(
        &mut self,
        lib: &str,
        time: TimestampMs,
        raw: &RawValue,
        hostname: Option<&str>,
    ) -> PageUpdate {
        let extracted = match self.accessors.for_lib(lib) {
            Some(fields) => self.engine.extract_bid(lib, fields, raw, time),
            None => Err(ExtractionDrop::UnknownLibrary(lib.to_string())),
        };
        let bid = match extracted {
            Ok(bid) => bid,
            Err(drop) => {
                if drop == ExtractionDrop::Unpriced {
                    tracing::trace!(lib, "unpriced bid event ignored");
                } else {
                    tracing::debug!(lib, reason = %drop, "bid event dropped");
                }
                return PageUpdate {
                    outcome: EventOutcome::Dropped(drop),
                    displays: Vec::new(),
                    number_of_ads: self.aggregator.number_of_ads(),
                    won_bid_id: None,
                };
            }
        };

        let won_bid_id = if bid.won() {
            let input = WonBidInput {
                bid: bid.clone(),
                hostname: hostname.map(str::to_string),
                original: raw.snapshot(SNAPSHOT_MAX_DEPTH),
            };
            match self.repo.append_won_bid(input) {
                Ok(id) => Some(id),
                Err(e) => {
                    tracing::warn!(error = %e, "won bid not recorded");
                    None
                }
            }
        } else {
            None
        };

        tracing::debug!(
            lib,
            unit_code = bid.unit_code().as_str(),
            bidder = bid.bidder(),
            cpm = bid.cpm(),
            won = bid.won(),
            "bid ingested"
        );
        self.aggregator.ingest_bid(bid);

        let displays = self
            .aggregator
            .linked_slots()
            .map(|id| (id.clone(), self.aggregator.resolve_display(id)))
            .collect();
        PageUpdate {
            outcome: EventOutcome::Ingested,
            displays,
            number_of_ads: self.aggregator.number_of_ads(),
            won_bid_id,
        }
    }

    pub fn handle_slot(&mut self, link: &SlotLink) -> PageUpdate {
        self.aggregator.ingest_slot(link);
        tracing::debug!(
            id = link.id.as_str(),
            unit_code = link.unit_code.as_str(),
            "slot linked"
        );
        PageUpdate {
            outcome: EventOutcome::Ingested,
            displays: vec![(link.id.clone(), self.aggregator.resolve_display(&link.id))],
            number_of_ads: self.aggregator.number_of_ads(),
            won_bid_id: None,
        }
    }

    /// Registers instrumentations and starts looking for their libraries.
    pub fn start_discovery(
        &mut self,
        locators: Vec<LibraryLocator>,
        instrumentations: Vec<Box<dyn Instrumentation>>,
    ) {
        self.discovery = Some(DiscoveryPoller::new(self.config.discovery, locators));
        self.instrumentations = instrumentations.into_iter().map(|i| (i, false)).collect();
    }

    pub fn page_loaded(&mut self, now: TimestampMs) {
        if let Some(discovery) = self.discovery.as_mut() {
            discovery.page_loaded(now);
        }
    }

    /// One discovery/poll round: attach to newly found libraries, then drain
    /// every attached instrumentation through `handle`.
    pub fn tick(&mut self, now: TimestampMs, globals: &RawValue) -> TickReport {
        let mut report = TickReport::default();
        let mut events = Vec::new();

        if let Some(discovery) = self.discovery.as_mut() {
            let found = discovery.poll(now, &self.engine, globals);
            report.not_found = found.not_found;
            for library in &found.found {
                for (instr, attached) in self.instrumentations.iter_mut() {
                    if *attached || instr.lib() != library.lib {
                        continue;
                    }
                    *attached = true;
                    events.extend(instr.attach(library));
                    report.attached.push(library.lib.clone());
                }
            }
        }

        for (instr, attached) in self.instrumentations.iter_mut() {
            if *attached {
                events.extend(instr.poll());
            }
        }

        report.updates = events.iter().map(|e| self.handle(e)).collect();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adradar_contracts::bid::UnitCode;
    use adradar_contracts::display::DisplayKind;
    use adradar_storage::ledger::InMemoryWonBidLedger;
    use serde_json::json;

    fn session() -> PageSession<InMemoryWonBidLedger> {
        PageSession::with_default_accessors(InMemoryWonBidLedger::new_in_memory())
    }

    fn slot(id: &str, unit: &str) -> SlotLink {
        SlotLink::new(SlotId::new(id).unwrap(), UnitCode::new(unit).unwrap())
    }

    fn pbjs_bid(unit: &str, bidder: &str, cpm: f64, won: bool) -> RawValue {
        RawValue::from_json(&json!({
            "adUnitCode": unit, "bidder": bidder, "cpm": cpm, "currency": "USD", "won": won
        }))
    }

    #[test]
    fn at_session_01_bid_reresolves_every_linked_slot() {
        let mut s = session();
        s.handle_slot(&slot("div-a", "a"));
        s.handle_slot(&slot("div-b", "b"));
        let update = s.handle_bid(
            "pbjs",
            TimestampMs(10),
            &pbjs_bid("a", "rubicon", 1.25, false),
            None,
        );
        assert_eq!(update.outcome, EventOutcome::Ingested);
        assert_eq!(update.displays.len(), 2);
        assert_eq!(update.displays[0].1.kind, DisplayKind::LowerBound);
        assert_eq!(update.displays[0].1.text, "CPM of at least 1.250 USD");
        assert_eq!(update.displays[1].1.kind, DisplayKind::NoInformation);
        assert_eq!(update.number_of_ads, 2);
    }

    #[test]
    fn at_session_02_slot_event_resolves_only_that_slot() {
        let mut s = session();
        s.handle_bid("pbjs", TimestampMs(10), &pbjs_bid("a", "appnexus", 2.0, true), None);
        s.handle_slot(&slot("div-b", "b"));
        let update = s.handle_slot(&slot("div-a", "a"));
        assert_eq!(update.displays.len(), 1);
        assert_eq!(update.displays[0].1.text, "CPM of 2.000 USD paid via appnexus");
    }

    #[test]
    fn at_session_03_won_bids_are_recorded_with_hostname_and_snapshot() {
        let mut s = session();
        let lost = s.handle(&PageEvent::Bid {
            lib: "pbjs".to_string(),
            time: TimestampMs(1),
            bid: pbjs_bid("a", "x", 0.5, false),
            hostname: Some("news.example".to_string()),
        });
        let mut raw = pbjs_bid("a", "y", 0.9, true);
        if let RawValue::Object(members) = &mut raw {
            members.insert(
                "getStatusCode".to_string(),
                RawValue::method_returning(RawValue::from(1.0)),
            );
            members.insert("render".to_string(), RawValue::method_returning(RawValue::Null));
        }
        let won = s.handle(&PageEvent::Bid {
            lib: "pbjs".to_string(),
            time: TimestampMs(2),
            bid: raw,
            hostname: Some("news.example".to_string()),
        });
        assert_eq!(lost.won_bid_id, None);
        assert_eq!(won.won_bid_id, Some(WonBidId(1)));

        let rows = s.repo().won_bid_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].bid.bidder(), "y");
        assert_eq!(rows[0].hostname.as_deref(), Some("news.example"));
        assert_eq!(
            rows[0].original.to_json(),
            json!({
                "adUnitCode": "a", "bidder": "y", "cpm": 0.9, "currency": "USD", "won": true,
                "getStatusCode": {"result": 1.0},
                "render": {}
            })
        );
        assert_eq!(s.repo().won_bid_rows_by_hostname("news.example").len(), 1);

        s.handle_bid("pbjs", TimestampMs(3), &pbjs_bid("b", "z", 1.1, true), None);
        assert_eq!(s.repo().won_bid_rows()[1].hostname, None);
    }

    #[test]
    fn at_session_04_unknown_library_and_unpriced_bids_are_dropped() {
        let mut s = session();
        let unknown = s.handle_bid(
            "yieldbird",
            TimestampMs(1),
            &pbjs_bid("a", "x", 1.0, false),
            None,
        );
        assert_eq!(
            unknown.outcome,
            EventOutcome::Dropped(ExtractionDrop::UnknownLibrary("yieldbird".to_string()))
        );
        let unpriced = s.handle_bid("pbjs", TimestampMs(1), &pbjs_bid("a", "x", 0.0, false), None);
        assert_eq!(unpriced.outcome, EventOutcome::Dropped(ExtractionDrop::Unpriced));
        assert!(s.aggregator().history(&UnitCode::new("a").unwrap()).is_empty());
    }

    #[test]
    fn at_session_05_rejected_proposal_keeps_active_accessors() {
        let mut s = session();
        let before = s.accessors().clone();
        let report = s
            .propose_accessors(&json!({"accessors": {"pbjs": {"cpm": {"getAttribute": "cpm"}}}}))
            .unwrap_err();
        assert!(!report.is_empty());
        assert_eq!(s.accessors(), &before);

        let mut doc = before.to_json();
        doc["accessors"]["pbjs"]["cpm"] = json!({"constant": 3});
        let proposed = s.propose_accessors(&doc).unwrap();
        s.apply_accessors(proposed);
        let update = s.handle_bid("pbjs", TimestampMs(1), &pbjs_bid("a", "x", 1.0, false), None);
        assert_eq!(update.outcome, EventOutcome::Ingested);
        assert_eq!(
            s.aggregator().history(&UnitCode::new("a").unwrap())[0].cpm(),
            3.0
        );
    }

    #[test]
    fn at_session_06_reset_clears_page_state_but_not_ledger() {
        let mut s = session();
        s.handle_slot(&slot("div-a", "a"));
        s.handle_bid("pbjs", TimestampMs(1), &pbjs_bid("a", "x", 1.0, true), None);
        s.reset();
        assert_eq!(s.aggregator().number_of_ads(), 0);
        assert_eq!(
            s.resolve_display(&SlotId::new("div-a").unwrap()).kind,
            DisplayKind::NoInformation
        );
        assert_eq!(s.repo().won_bid_rows().len(), 1);
    }
}
