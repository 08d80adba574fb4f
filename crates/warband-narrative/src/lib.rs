//! Narrative event types and the [`NarrativeSink`] trait the tick engine
//! publishes to (spec §6). The out-of-scope messaging client would
//! implement this trait against the outbound webhook; tests and the demo
//! binary use the in-memory [`RecordingSink`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

use std::sync::Mutex;

use warband_core::{Day, Faction, LocationId};

/// A personal narrative event delivered to one combatant's principal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PersonalEvent {
    /// This combatant's attack killed its target.
    AttackSuccess,
    /// This combatant's attack failed.
    AttackFailure,
    /// This combatant had no valid target to attack.
    NoTarget,
    /// This combatant's revive attempt succeeded.
    ReviveSuccess,
    /// This combatant's revive attempt failed.
    ReviveFailure,
    /// This combatant had no fallen ally to revive.
    ReviveNoTarget,
    /// This combatant's counter-attack killed its attacker.
    CounterAttackSuccess,
    /// This combatant's counter-attack failed.
    CounterAttackFailure,
    /// This combatant's location saw no contest today (single faction
    /// present, or nobody present).
    NoBattleToday,
}

/// A per-location summary of one day's combat, before/after occupier and
/// survivor/fatality counts (spec §6).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocationSummary {
    /// The day the summary covers.
    pub day: Day,
    /// The location.
    pub location: LocationId,
    /// Occupier at the start of the day's battle resolution.
    pub occupier_before: Option<Faction>,
    /// Occupier after the day's battle resolution.
    pub occupier_after: Option<Faction>,
    /// Surviving combatant count, per faction that had a presence.
    pub survivors: Vec<(Faction, u32)>,
    /// Fatality count, per faction that had a presence.
    pub fatalities: Vec<(Faction, u32)>,
}

/// Where the engine publishes narrative artifacts as a side effect of the
/// daily tick. Implementations must not fail the tick: the engine logs
/// and continues on any sink failure (spec §4.5, §7).
pub trait NarrativeSink: Send + Sync {
    /// Deliver a personal event to one combatant's principal.
    fn personal(&self, principal: &str, event: PersonalEvent);

    /// Publish a per-location summary.
    fn location_summary(&self, summary: LocationSummary);

    /// Trigger the once-per-tick map-frame render.
    fn map_frame(&self, day: Day);
}

/// An in-memory [`NarrativeSink`] that records everything it receives, for
/// tests and the demo binary.
#[derive(Default)]
pub struct RecordingSink {
    personal: Mutex<Vec<(String, PersonalEvent)>>,
    summaries: Mutex<Vec<LocationSummary>>,
    map_frames: Mutex<Vec<Day>>,
}

impl RecordingSink {
    /// An empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every personal event recorded so far, in delivery order.
    pub fn personal_events(&self) -> Vec<(String, PersonalEvent)> {
        self.personal.lock().expect("recording sink poisoned").clone()
    }

    /// Every location summary recorded so far, in publication order.
    pub fn summaries(&self) -> Vec<LocationSummary> {
        self.summaries.lock().expect("recording sink poisoned").clone()
    }

    /// Every map-frame trigger recorded so far, in trigger order.
    pub fn map_frames(&self) -> Vec<Day> {
        self.map_frames.lock().expect("recording sink poisoned").clone()
    }
}

impl NarrativeSink for RecordingSink {
    fn personal(&self, principal: &str, event: PersonalEvent) {
        self.personal
            .lock()
            .expect("recording sink poisoned")
            .push((principal.to_string(), event));
    }

    fn location_summary(&self, summary: LocationSummary) {
        self.summaries.lock().expect("recording sink poisoned").push(summary);
    }

    fn map_frame(&self, day: Day) {
        self.map_frames.lock().expect("recording sink poisoned").push(day);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_preserves_delivery_order() {
        let sink = RecordingSink::new();
        sink.personal("p1", PersonalEvent::AttackSuccess);
        sink.personal("p1", PersonalEvent::NoBattleToday);
        let events = sink.personal_events();
        assert_eq!(events, vec![
            ("p1".to_string(), PersonalEvent::AttackSuccess),
            ("p1".to_string(), PersonalEvent::NoBattleToday),
        ]);
    }

    #[test]
    fn map_frame_records_one_entry_per_trigger() {
        let sink = RecordingSink::new();
        sink.map_frame(Day(1));
        sink.map_frame(Day(2));
        assert_eq!(sink.map_frames(), vec![Day(1), Day(2)]);
    }

    #[test]
    fn location_summary_round_trips() {
        let sink = RecordingSink::new();
        let summary = LocationSummary {
            day: Day(3),
            location: LocationId(7),
            occupier_before: None,
            occupier_after: Some(Faction::StaghornSect),
            survivors: vec![(Faction::StaghornSect, 2)],
            fatalities: vec![(Faction::OrderGorgona, 1)],
        };
        sink.location_summary(summary.clone());
        assert_eq!(sink.summaries(), vec![summary]);
    }
}
