//! Facade crate: wires [`warband_store`], [`warband_lock`],
//! [`warband_engine`], and [`warband_command`] into a runnable [`World`],
//! plus process [`Config`] and the `sim` binary's migrations.
//!
//! This is the only crate that knows about every other Warband crate at
//! once; everything downstream of it (the HTTP front door, the OAuth1
//! messaging client, the scheduler trigger) is out of scope (spec §1) and
//! is modeled only as the trait seams [`warband_narrative::NarrativeSink`]
//! and [`warband_command::ParsedCommand`] already define.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod sink;

pub use config::Config;
pub use sink::TracingSink;

use tokio_util::sync::CancellationToken;
use warband_command::{CommandService, ParsedCommand};
use warband_core::{Day, StoreError, TickError};
use warband_engine::TickEngine;
use warband_lock::TickLock;
use warband_narrative::NarrativeSink;
use warband_store::PgStore;

/// The running simulation: a [`PgStore`], a [`TickLock`] shared between
/// the tick and every command, and a narrative sink.
///
/// Generic over the sink so the `sim` binary can swap [`TracingSink`] for
/// a real messaging-client adapter without this crate changing; tests use
/// [`warband_narrative::RecordingSink`] the same way.
pub struct World<N> {
    store: PgStore,
    lock: TickLock,
    narrative: N,
    seed_offset: u64,
}

impl<N: NarrativeSink> World<N> {
    /// Connect to Postgres at `database_url`, run pending migrations, and
    /// build a `World` over the given narrative sink.
    ///
    /// `seed_offset` seeds every tick's battle RNG (XORed with the day and
    /// location per `warband-engine`); pass a fixed value for
    /// reproducible demos and tests, or a process-random value in
    /// production.
    pub async fn connect(database_url: &str, narrative: N, seed_offset: u64) -> Result<Self, StoreError> {
        let store = PgStore::connect(database_url).await?;
        Ok(Self {
            store,
            lock: TickLock::new(),
            narrative,
            seed_offset,
        })
    }

    /// Run one full day's tick to completion (spec §4.5).
    pub async fn tick(&self) -> Result<Day, TickError> {
        let engine = TickEngine::new(&self.store, &self.lock, &self.narrative, self.seed_offset);
        engine.run_tick().await
    }

    /// Apply one already-parsed command under a reader hold (spec §4.6).
    pub async fn command(&self, cmd: ParsedCommand, cancel: &CancellationToken) -> Result<String, StoreError> {
        let service = CommandService::new(&self.store, &self.lock);
        service.handle(cmd, cancel).await
    }

    /// The narrative sink this world publishes to.
    pub fn narrative(&self) -> &N {
        &self.narrative
    }
}
