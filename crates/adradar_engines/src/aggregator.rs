#![forbid(unsafe_code)]

use adradar_contracts::bid::{Bid, SlotId, SlotLink, UnitCode};
use adradar_contracts::display::{SlotDisplay, SlotState};

use crate::collection_map::{MapWithListValues, MapWithSetValues};
use crate::display::select_display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorConfig {
    /// A prior bid is outdated once a newer bid for its unit arrives more than this much later.
    pub outdate_threshold_ms: u64,
}

impl AggregatorConfig {
    pub fn mvp_v1() -> Self {
        Self {
            outdate_threshold_ms: 2_000,
        }
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self::mvp_v1()
    }
}

/// Per-slot bid state for one page lifetime.
///
/// Nothing is ever removed: slot linkages only grow and bid histories are
/// append-only, with staleness carried by each bid's `outdated` flag.
#[derive(Debug, Clone, Default)]
pub struct BidAggregator {
    config: AggregatorConfig,
    id2units: MapWithSetValues<SlotId, UnitCode>,
    unit2bids: MapWithListValues<UnitCode, Bid>,
}

impl BidAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            config,
            id2units: Default::default(),
            unit2bids: Default::default(),
        }
    }

    pub fn config(&self) -> AggregatorConfig {
        self.config
    }

    pub fn reset(&mut self) {
        self.id2units.clear();
        self.unit2bids.clear();
    }

    /// Links `unit_code` to the slot, and the slot to itself. Idempotent.
    pub fn ingest_slot(&mut self, link: &SlotLink) {
        self.id2units.add(link.id.clone(), link.unit_code.clone());
        self.id2units.add(link.id.clone(), link.id.as_unit_code());
    }

    /// Outdates prior bids of the same unit that are too old, then appends `bid`.
    pub fn ingest_bid(&mut self, bid: Bid) {
        let threshold = self.config.outdate_threshold_ms;
        let arrived = bid.time();
        self.unit2bids.map_values(bid.unit_code(), |prior| {
            if !prior.is_outdated() && arrived.millis_since(prior.time()) > threshold {
                prior.outdated_copy()
            } else {
                prior.clone()
            }
        });
        self.unit2bids.add(bid.unit_code().clone(), bid);
    }

    pub fn linked_slots(&self) -> impl Iterator<Item = &SlotId> {
        self.id2units.keys()
    }

    pub fn units_for(&self, id: &SlotId) -> impl Iterator<Item = &UnitCode> {
        self.id2units.get(id).iter()
    }

    pub fn history(&self, unit_code: &UnitCode) -> &[Bid] {
        self.unit2bids.get(unit_code)
    }

    /// Priced, non-outdated bids across every unit linked to `id`, in unit then arrival order.
    pub fn live_bids(&self, id: &SlotId) -> Vec<&Bid> {
        self.units_for(id)
            .flat_map(|unit| self.history(unit).iter())
            .filter(|b| b.is_priced() && !b.is_outdated())
            .collect()
    }

    pub fn slot_state(&self, id: &SlotId) -> SlotState {
        if !self.id2units.contains_key(id) {
            SlotState::Unknown
        } else if self.live_bids(id).is_empty() {
            SlotState::Linked
        } else {
            SlotState::Priced
        }
    }

    /// Slots in `Linked` or `Priced` state.
    pub fn number_of_ads(&self) -> usize {
        self.id2units.len()
    }

    pub fn resolve_display(&self, id: &SlotId) -> SlotDisplay {
        select_display(&self.live_bids(id))
    }
}
