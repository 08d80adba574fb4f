//! [`CommandService`]: applies one already-parsed command against the
//! [`Store`] under a [`TickLock`] reader hold (spec §4.6).
//!
//! `ParsedCommand` is the seam the out-of-scope text parser would produce;
//! this crate never tokenizes raw command text. Every handler acquires a
//! reader hold first — if the probe reports busy, the service returns the
//! busy reply and performs no Store write at all (spec §5, suspension
//! point (1)).

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod locations;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use warband_classes::Class;
use warband_core::{CommandError, Faction, StoreError};
use warband_lock::TickLock;
use warband_store::{Combatant, Store};

pub use locations::{normalize, resolve_alias, LocationFixture, ADJACENCY, LOCATIONS, TEMPLES};

/// The eight inbound command verbs (spec §6's inbound command surface).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verb {
    /// `help`
    Help,
    /// `status`
    Status,
    /// `logistics`
    Logistics,
    /// `join`
    Join,
    /// `move`
    Move,
    /// `advance`
    Advance,
    /// `quit`
    Quit,
    /// `toggleupdates`
    ToggleUpdates,
}

/// One already-tokenized command, the shape the out-of-scope parser
/// produces (spec §6: `{verb, argument, principal_id}`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedCommand {
    /// The opaque external id of whoever issued the command.
    pub principal: String,
    /// Which of the eight verbs this is.
    pub verb: Verb,
    /// The raw argument tail, if any (faction keyword, location alias,
    /// class keyword — verb-dependent).
    pub argument: Option<String>,
}

/// Internal error union so `dispatch` can `?`-propagate both Store
/// failures and user-facing command errors, then split them back apart
/// in [`CommandService::handle`] (spec §7's propagation policy: user
/// errors become reply text, infrastructure errors propagate to the
/// caller to log).
enum DispatchError {
    Command(CommandError),
    Store(StoreError),
}

impl From<StoreError> for DispatchError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<CommandError> for DispatchError {
    fn from(e: CommandError) -> Self {
        Self::Command(e)
    }
}

/// Applies commands to a [`Store`] under a [`TickLock`] reader hold.
pub struct CommandService<'a, S> {
    store: &'a S,
    lock: &'a TickLock,
}

impl<'a, S: Store> CommandService<'a, S> {
    /// Build a service over the given collaborators.
    pub fn new(store: &'a S, lock: &'a TickLock) -> Self {
        Self { store, lock }
    }

    /// Apply one command, returning the reply text.
    ///
    /// `Ok` covers every user-facing outcome, including every
    /// [`CommandError`] variant rendered as reply text — those are not
    /// failures of this call, just what the command layer tells the
    /// principal. `Err` is reserved for a Store failure the caller should
    /// log and surface as an infrastructure problem (spec §7); the HTTP
    /// front door (out of scope) always answers 200 regardless.
    pub async fn handle(&self, cmd: ParsedCommand, cancel: &CancellationToken) -> Result<String, StoreError> {
        debug!(verb = ?cmd.verb, "command received");
        let reader = match self.lock.try_acquire_reader().await {
            Ok(guard) => guard,
            Err(_) => return Ok(CommandError::Busy.to_string()),
        };
        let result = self.dispatch(&cmd, cancel).await;
        drop(reader);
        match result {
            Ok(reply) => Ok(reply),
            Err(DispatchError::Command(e)) => Ok(e.to_string()),
            Err(DispatchError::Store(e)) => Err(e),
        }
    }

    async fn dispatch(&self, cmd: &ParsedCommand, cancel: &CancellationToken) -> Result<String, DispatchError> {
        match cmd.verb {
            Verb::Help => self.help(cmd, cancel).await,
            Verb::Status => self.status(cmd, cancel).await,
            Verb::Logistics => self.logistics(cmd, cancel).await,
            Verb::Join => self.join(cmd, cancel).await,
            Verb::Move => self.r#move(cmd, cancel).await,
            Verb::Advance => self.advance(cmd, cancel).await,
            Verb::Quit => self.quit(cmd, cancel).await,
            Verb::ToggleUpdates => self.toggle_updates(cmd, cancel).await,
        }
    }

    async fn active(&self, principal: &str, cancel: &CancellationToken) -> Result<Combatant, DispatchError> {
        self.store
            .find_active_by_principal(principal, cancel)
            .await?
            .ok_or(CommandError::NotPlaying)
            .map_err(DispatchError::from)
    }

    async fn help(&self, cmd: &ParsedCommand, cancel: &CancellationToken) -> Result<String, DispatchError> {
        let exists = self.store.find_by_principal(&cmd.principal, cancel).await?.is_some();
        Ok(if exists {
            "commands: status, logistics [location], move <location>, advance [class], \
             toggleupdates, quit"
                .to_string()
        } else {
            "you haven't joined yet: join <staghorn|gorgona|baaturate> to begin".to_string()
        })
    }

    async fn status(&self, cmd: &ParsedCommand, cancel: &CancellationToken) -> Result<String, DispatchError> {
        let c = self.active(&cmd.principal, cancel).await?;
        let location = c.location.and_then(location_name).unwrap_or("nowhere (dead)");
        let next = c.next_location.and_then(location_name).unwrap_or("nowhere");
        Ok(format!(
            "{} | {} rank {} | at {location}, heading to {next} | experience {}",
            c.faction, c.class, c.rank, c.experience
        ))
    }

    async fn logistics(&self, cmd: &ParsedCommand, cancel: &CancellationToken) -> Result<String, DispatchError> {
        let c = self.active(&cmd.principal, cancel).await?;
        let alive = self.store.list_alive(cancel).await?;
        match &cmd.argument {
            None => {
                let count = alive.iter().filter(|o| o.faction == c.faction).count();
                Ok(format!("{} has {count} combatants in the field", c.faction))
            }
            Some(raw) => {
                let Some(location) = resolve_alias(raw) else {
                    return Err(CommandError::UnknownLocation.into());
                };
                let mine = alive.iter().filter(|o| o.faction == c.faction);
                let arrivals = mine.clone().filter(|o| o.next_location == Some(location)).count();
                let departures = mine
                    .filter(|o| o.location == Some(location) && o.next_location != Some(location))
                    .count();
                let name = location_name(location).unwrap_or("that location");
                Ok(format!(
                    "{} at {name}: {arrivals} arriving, {departures} departing",
                    c.faction
                ))
            }
        }
    }

    async fn join(&self, cmd: &ParsedCommand, cancel: &CancellationToken) -> Result<String, DispatchError> {
        if let Some(existing) = self.store.find_by_principal(&cmd.principal, cancel).await? {
            return Err(if existing.active {
                CommandError::AlreadyPlaying.into()
            } else {
                CommandError::GateClosed.into()
            });
        }
        let Some(faction) = cmd.argument.as_deref().and_then(Faction::from_keyword) else {
            return Err(CommandError::UnknownFaction.into());
        };
        self.store.create_combatant(&cmd.principal, faction, cancel).await?;
        Ok(format!("welcome to {faction}"))
    }

    async fn r#move(&self, cmd: &ParsedCommand, cancel: &CancellationToken) -> Result<String, DispatchError> {
        let c = self.active(&cmd.principal, cancel).await?;
        let Some(current) = c.location else {
            return Err(CommandError::Dead.into());
        };
        let Some(raw) = cmd.argument.as_deref() else {
            return Err(CommandError::UnknownLocation.into());
        };
        let Some(destination) = resolve_alias(raw) else {
            return Err(CommandError::UnknownLocation.into());
        };
        if destination != current {
            let adjacent = self.store.adjacent_locations(current, cancel).await?;
            if !adjacent.contains(&destination) {
                return Err(CommandError::NotAdjacent.into());
            }
        }
        self.store.set_next_location(c.id, destination, cancel).await?;
        let name = location_name(destination).unwrap_or("your destination");
        Ok(format!("heading to {name}"))
    }

    async fn advance(&self, cmd: &ParsedCommand, cancel: &CancellationToken) -> Result<String, DispatchError> {
        let c = self.active(&cmd.principal, cancel).await?;
        let current = Class::from_slug(&c.class).ok_or(CommandError::UnknownAdvance)?;

        match &cmd.argument {
            Some(raw) => {
                let target = Class::from_slug(&normalize(raw)).ok_or(CommandError::UnknownAdvance)?;
                if !current.advances_from().contains(&target) {
                    return Err(CommandError::UnknownAdvance.into());
                }
                if c.experience < 100 {
                    return Err(CommandError::InsufficientExperience.into());
                }
                self.store.advance(c.id, target.slug(), 1, cancel).await?;
                Ok(format!("advanced to {target}"))
            }
            None => {
                if c.experience < 100 {
                    return Err(CommandError::InsufficientExperience.into());
                }
                if c.rank < current.rank_cap() {
                    self.store.advance(c.id, current.slug(), c.rank + 1, cancel).await?;
                    Ok(format!("ranked up to {} rank {}", current, c.rank + 1))
                } else {
                    let options = current.advances_from();
                    if options.is_empty() {
                        return Err(CommandError::NoAdvancesAvailable.into());
                    }
                    let names: Vec<&str> = options.iter().map(|c| c.slug()).collect();
                    Ok(format!("available advances: {}", names.join(", ")))
                }
            }
        }
    }

    async fn quit(&self, cmd: &ParsedCommand, cancel: &CancellationToken) -> Result<String, DispatchError> {
        let c = self.active(&cmd.principal, cancel).await?;
        self.store.deactivate(c.id, cancel).await?;
        Ok("you have left the field".to_string())
    }

    async fn toggle_updates(&self, cmd: &ParsedCommand, cancel: &CancellationToken) -> Result<String, DispatchError> {
        let c = self.active(&cmd.principal, cancel).await?;
        let new_value = self.store.toggle_updates(c.id, cancel).await?;
        Ok(format!("updates now {}", if new_value { "on" } else { "off" }))
    }
}

fn location_name(id: warband_core::LocationId) -> Option<&'static str> {
    LOCATIONS.iter().find(|l| l.id == id.0).map(|l| l.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use warband_core::LocationId;
    use warband_store::memory::InMemoryStore;

    fn service_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        let locations = LOCATIONS.iter().map(|l| (l.id, l.name));
        let temples = TEMPLES.iter().copied();
        store.seed(locations, ADJACENCY.iter().copied(), temples);
        store
    }

    fn cmd(principal: &str, verb: Verb, argument: Option<&str>) -> ParsedCommand {
        ParsedCommand {
            principal: principal.to_string(),
            verb,
            argument: argument.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn join_creates_a_combatant_at_the_temple() {
        let store = service_store();
        let lock = TickLock::new();
        let cancel = CancellationToken::new();
        let service = CommandService::new(&store, &lock);

        let reply = service.handle(cmd("p1", Verb::Join, Some("staghorn")), &cancel).await.unwrap();
        assert!(reply.contains("Staghorn"));
        let c = store.find_active_by_principal("p1", &cancel).await.unwrap().unwrap();
        assert_eq!(c.location, Some(LocationId(1)));
    }

    #[tokio::test]
    async fn join_twice_is_rejected() {
        let store = service_store();
        let lock = TickLock::new();
        let cancel = CancellationToken::new();
        let service = CommandService::new(&store, &lock);

        service.handle(cmd("p1", Verb::Join, Some("staghorn")), &cancel).await.unwrap();
        let reply = service.handle(cmd("p1", Verb::Join, Some("staghorn")), &cancel).await.unwrap();
        assert_eq!(reply, CommandError::AlreadyPlaying.to_string());
    }

    #[tokio::test]
    async fn join_with_unknown_faction_is_rejected() {
        let store = service_store();
        let lock = TickLock::new();
        let cancel = CancellationToken::new();
        let service = CommandService::new(&store, &lock);

        let reply = service.handle(cmd("p1", Verb::Join, Some("nonsense")), &cancel).await.unwrap();
        assert_eq!(reply, CommandError::UnknownFaction.to_string());
    }

    #[tokio::test]
    async fn quit_then_rejoin_is_gate_closed() {
        let store = service_store();
        let lock = TickLock::new();
        let cancel = CancellationToken::new();
        let service = CommandService::new(&store, &lock);

        service.handle(cmd("p1", Verb::Join, Some("staghorn")), &cancel).await.unwrap();
        service.handle(cmd("p1", Verb::Quit, None), &cancel).await.unwrap();
        let reply = service.handle(cmd("p1", Verb::Join, Some("staghorn")), &cancel).await.unwrap();
        assert_eq!(reply, CommandError::GateClosed.to_string());
    }

    #[tokio::test]
    async fn move_to_adjacent_location_succeeds() {
        let store = service_store();
        let lock = TickLock::new();
        let cancel = CancellationToken::new();
        let service = CommandService::new(&store, &lock);

        service.handle(cmd("p1", Verb::Join, Some("staghorn")), &cancel).await.unwrap();
        let reply = service.handle(cmd("p1", Verb::Move, Some("antler pass")), &cancel).await.unwrap();
        assert!(reply.contains("Antler Pass"));
        let c = store.find_active_by_principal("p1", &cancel).await.unwrap().unwrap();
        assert_eq!(c.next_location, Some(LocationId(4)));
    }

    #[tokio::test]
    async fn move_to_non_adjacent_location_is_rejected() {
        let store = service_store();
        let lock = TickLock::new();
        let cancel = CancellationToken::new();
        let service = CommandService::new(&store, &lock);

        service.handle(cmd("p1", Verb::Join, Some("staghorn")), &cancel).await.unwrap();
        let reply = service.handle(cmd("p1", Verb::Move, Some("gorgona temple")), &cancel).await.unwrap();
        assert_eq!(reply, CommandError::NotAdjacent.to_string());
    }

    #[tokio::test]
    async fn move_to_current_location_is_a_no_op_success() {
        let store = service_store();
        let lock = TickLock::new();
        let cancel = CancellationToken::new();
        let service = CommandService::new(&store, &lock);

        service.handle(cmd("p1", Verb::Join, Some("staghorn")), &cancel).await.unwrap();
        let reply = service.handle(cmd("p1", Verb::Move, Some("staghorn temple")), &cancel).await.unwrap();
        assert!(reply.contains("Staghorn Temple"));
    }

    #[tokio::test]
    async fn advance_with_insufficient_experience_is_rejected() {
        let store = service_store();
        let lock = TickLock::new();
        let cancel = CancellationToken::new();
        let service = CommandService::new(&store, &lock);

        service.handle(cmd("p1", Verb::Join, Some("staghorn")), &cancel).await.unwrap();
        let reply = service.handle(cmd("p1", Verb::Advance, Some("infantry")), &cancel).await.unwrap();
        assert_eq!(reply, CommandError::InsufficientExperience.to_string());
    }

    #[tokio::test]
    async fn advance_to_a_reachable_class_succeeds() {
        let store = service_store();
        let lock = TickLock::new();
        let cancel = CancellationToken::new();
        let service = CommandService::new(&store, &lock);

        service.handle(cmd("p1", Verb::Join, Some("staghorn")), &cancel).await.unwrap();
        let c = store.find_active_by_principal("p1", &cancel).await.unwrap().unwrap();
        store.add_experience(c.id, 100, &cancel).await.unwrap();

        let reply = service.handle(cmd("p1", Verb::Advance, Some("infantry")), &cancel).await.unwrap();
        assert!(reply.contains("infantry"));
        let c = store.find_active_by_principal("p1", &cancel).await.unwrap().unwrap();
        assert_eq!(c.class, "infantry");
        assert_eq!(c.rank, 1);
        assert_eq!(c.experience, 0);
    }

    #[tokio::test]
    async fn advance_to_an_unreachable_class_is_rejected() {
        let store = service_store();
        let lock = TickLock::new();
        let cancel = CancellationToken::new();
        let service = CommandService::new(&store, &lock);

        service.handle(cmd("p1", Verb::Join, Some("staghorn")), &cancel).await.unwrap();
        let c = store.find_active_by_principal("p1", &cancel).await.unwrap().unwrap();
        store.add_experience(c.id, 100, &cancel).await.unwrap();

        let reply = service.handle(cmd("p1", Verb::Advance, Some("mage")), &cancel).await.unwrap();
        assert_eq!(reply, CommandError::UnknownAdvance.to_string());
    }

    #[tokio::test]
    async fn toggle_updates_flips_the_flag() {
        let store = service_store();
        let lock = TickLock::new();
        let cancel = CancellationToken::new();
        let service = CommandService::new(&store, &lock);

        service.handle(cmd("p1", Verb::Join, Some("staghorn")), &cancel).await.unwrap();
        let reply = service.handle(cmd("p1", Verb::ToggleUpdates, None), &cancel).await.unwrap();
        assert_eq!(reply, "updates now off");
    }

    #[tokio::test]
    async fn commands_from_a_principal_who_never_joined_are_rejected() {
        let store = service_store();
        let lock = TickLock::new();
        let cancel = CancellationToken::new();
        let service = CommandService::new(&store, &lock);

        let reply = service.handle(cmd("ghost", Verb::Status, None), &cancel).await.unwrap();
        assert_eq!(reply, CommandError::NotPlaying.to_string());
    }

    #[tokio::test]
    async fn busy_writer_short_circuits_before_any_store_call() {
        let store = service_store();
        let lock = TickLock::new();
        let cancel = CancellationToken::new();
        let service = CommandService::new(&store, &lock);

        let writer = lock.acquire_writer().await;
        let reply = service.handle(cmd("p1", Verb::Join, Some("staghorn")), &cancel).await.unwrap();
        assert_eq!(reply, CommandError::Busy.to_string());
        writer.release().await;

        assert!(store.find_active_by_principal("p1", &cancel).await.unwrap().is_none());
    }
}
