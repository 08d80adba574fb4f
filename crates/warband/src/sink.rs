//! [`TracingSink`]: a [`NarrativeSink`] that logs every narrative artifact
//! via `tracing` instead of delivering it anywhere.
//!
//! Stands in for the out-of-scope outbound messaging client (spec §1):
//! the real adapter would translate these same events into OAuth1-signed
//! calls to a messaging API. Until that adapter exists, running the `sim`
//! binary still needs *a* sink, and logging structured events rather than
//! silently discarding them keeps an unfinished collaborator observable.

use tracing::{debug, info};

use warband_core::Day;
use warband_narrative::{LocationSummary, NarrativeSink, PersonalEvent};

/// Logs every narrative artifact at `debug` (personal events, which are
/// high-volume and per-principal) or `info` (location summaries and the
/// once-per-tick map-frame trigger, which are not).
#[derive(Default)]
pub struct TracingSink;

impl TracingSink {
    /// A fresh sink. Carries no state; logging has no buffering to flush.
    pub fn new() -> Self {
        Self
    }
}

impl NarrativeSink for TracingSink {
    fn personal(&self, principal: &str, event: PersonalEvent) {
        debug!(principal, ?event, "personal narrative event");
    }

    fn location_summary(&self, summary: LocationSummary) {
        info!(
            day = summary.day.0,
            location = summary.location.0,
            before = ?summary.occupier_before,
            after = ?summary.occupier_after,
            survivors = ?summary.survivors,
            fatalities = ?summary.fatalities,
            "location summary"
        );
    }

    fn map_frame(&self, day: Day) {
        info!(day = day.0, "map frame triggered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warband_core::{Faction, LocationId};

    #[test]
    fn sink_methods_do_not_panic() {
        let sink = TracingSink::new();
        sink.personal("p1", PersonalEvent::AttackSuccess);
        sink.location_summary(LocationSummary {
            day: Day(1),
            location: LocationId(4),
            occupier_before: None,
            occupier_after: Some(Faction::StaghornSect),
            survivors: vec![(Faction::StaghornSect, 3)],
            fatalities: vec![],
        });
        sink.map_frame(Day(1));
    }
}
