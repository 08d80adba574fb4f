//! [`PgStore`]: the Postgres-backed [`Store`](crate::traits::Store) implementation.

use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Row};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use warband_core::{CombatantId, Day, Faction, LocationId, StoreError};

use crate::error::map_sqlx_error;
use crate::traits::Store;
use crate::types::{CombatKind, CombatRecord, CombatResult, Combatant, Location};

/// Connection attempts before giving up (ground: the original's
/// `maxConnectionAttempts = 10` in `database/connection.go`).
const MAX_CONNECTION_ATTEMPTS: u32 = 10;

/// Backoff between connection attempts (ground: the original's
/// `time.Sleep(time.Second)` between retries).
const CONNECTION_RETRY_DELAY: Duration = Duration::from_secs(1);

/// A Postgres-backed [`Store`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to `database_url`, retrying up to [`MAX_CONNECTION_ATTEMPTS`]
    /// times with a one-second backoff between attempts, then run pending
    /// migrations.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let mut last_err = None;
        let mut pool = None;
        for attempt in 1..=MAX_CONNECTION_ATTEMPTS {
            match PgPoolOptions::new()
                .max_connections(10)
                .connect(database_url)
                .await
            {
                Ok(p) => {
                    pool = Some(p);
                    break;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "database connection attempt failed");
                    last_err = Some(e);
                    tokio::time::sleep(CONNECTION_RETRY_DELAY).await;
                }
            }
        }
        let pool = pool.ok_or_else(|| StoreError::Transient {
            reason: format!(
                "failed to connect after {MAX_CONNECTION_ATTEMPTS} attempts: {}",
                last_err.map(|e| e.to_string()).unwrap_or_default()
            ),
        })?;

        sqlx::migrate!("../warband/migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Fatal {
                reason: format!("migration failed: {e}"),
            })?;

        Ok(Self { pool })
    }

    /// Build a store around an already-connected pool, without migrating.
    /// Used by integration tests that manage migrations themselves.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct CombatantRow {
    id: i64,
    principal: String,
    faction: String,
    class: String,
    rank: i32,
    experience: i32,
    location: Option<i32>,
    next_location: Option<i32>,
    active: bool,
    receive_updates: bool,
}

impl TryFrom<CombatantRow> for Combatant {
    type Error = StoreError;

    fn try_from(row: CombatantRow) -> Result<Self, StoreError> {
        let faction = Faction::from_str(&row.faction).map_err(|e| StoreError::Fatal {
            reason: format!("combatant {} has unknown faction: {e}", row.id),
        })?;
        Ok(Combatant {
            id: CombatantId(row.id),
            principal: row.principal,
            faction,
            class: row.class,
            rank: row.rank as u16,
            experience: row.experience.max(0) as u16,
            location: row.location.map(LocationId),
            next_location: row.next_location.map(LocationId),
            active: row.active,
            receive_updates: row.receive_updates,
        })
    }
}

fn kind_str(kind: CombatKind) -> &'static str {
    match kind {
        CombatKind::Attack => "attack",
        CombatKind::CounterAttack => "counterattack",
        CombatKind::Revive => "revive",
    }
}

fn result_str(result: CombatResult) -> &'static str {
    match result {
        CombatResult::Success => "success",
        CombatResult::Failure => "failure",
        CombatResult::NoTarget => "notarget",
    }
}

/// Run `fut`, aborting with [`StoreError::Cancelled`] if `cancel` fires first.
async fn guarded<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, StoreError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(StoreError::Cancelled),
        result = fut => result,
    }
}

impl Store for PgStore {
    async fn get_location(
        &self,
        id: LocationId,
        cancel: &CancellationToken,
    ) -> Result<Option<Location>, StoreError> {
        guarded(cancel, async {
            let row = sqlx::query("SELECT id, name, owner, occupier FROM location WHERE id = $1")
                .bind(id.0)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(e, "get_location"))?;
            let Some(row) = row else {
                return Ok(None);
            };
            let owner: Option<String> = row.try_get("owner").map_err(|e| map_sqlx_error(e, "get_location"))?;
            let occupier: Option<String> =
                row.try_get("occupier").map_err(|e| map_sqlx_error(e, "get_location"))?;
            Ok(Some(Location {
                id,
                name: row.try_get("name").map_err(|e| map_sqlx_error(e, "get_location"))?,
                owner: owner
                    .map(|s| Faction::from_str(&s))
                    .transpose()
                    .map_err(|e| StoreError::Fatal {
                        reason: format!("location {id} has unknown owner: {e}"),
                    })?,
                occupier: occupier
                    .map(|s| Faction::from_str(&s))
                    .transpose()
                    .map_err(|e| StoreError::Fatal {
                        reason: format!("location {id} has unknown occupier: {e}"),
                    })?,
            }))
        })
        .await
    }

    async fn adjacent_locations(
        &self,
        id: LocationId,
        cancel: &CancellationToken,
    ) -> Result<Vec<LocationId>, StoreError> {
        guarded(cancel, async {
            let rows: Vec<(i32,)> =
                sqlx::query_as("SELECT adjacent FROM adjacent_location WHERE id = $1")
                    .bind(id.0)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(|e| map_sqlx_error(e, "adjacent_locations"))?;
            Ok(rows.into_iter().map(|(a,)| LocationId(a)).collect())
        })
        .await
    }

    async fn temple_location(
        &self,
        faction: Faction,
        cancel: &CancellationToken,
    ) -> Result<LocationId, StoreError> {
        guarded(cancel, async {
            let row: (i32,) = sqlx::query_as("SELECT location FROM temple WHERE faction = $1")
                .bind(faction.slug())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(e, "temple_location"))?;
            Ok(LocationId(row.0))
        })
        .await
    }

    async fn set_owner(
        &self,
        id: LocationId,
        faction: Faction,
        day: Day,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        guarded(cancel, async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| map_sqlx_error(e, "set_owner: begin"))?;
            let previous: Option<String> =
                sqlx::query_scalar("SELECT owner FROM location WHERE id = $1 FOR UPDATE")
                    .bind(id.0)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error(e, "set_owner: lock row"))?;
            if previous.as_deref() == Some(faction.slug()) {
                return Ok(());
            }
            sqlx::query("UPDATE location SET owner = $1 WHERE id = $2")
                .bind(faction.slug())
                .bind(id.0)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error(e, "set_owner: update"))?;
            sqlx::query(
                "INSERT INTO ownership_record (day, location, event, faction) VALUES ($1, $2, 'capture', $3)",
            )
            .bind(day.0)
            .bind(id.0)
            .bind(faction.slug())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(e, "set_owner: audit"))?;
            tx.commit().await.map_err(|e| map_sqlx_error(e, "set_owner: commit"))
        })
        .await
    }

    async fn set_occupier(
        &self,
        id: LocationId,
        faction: Faction,
        day: Day,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        guarded(cancel, async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| map_sqlx_error(e, "set_occupier: begin"))?;
            let previous: Option<String> =
                sqlx::query_scalar("SELECT occupier FROM location WHERE id = $1 FOR UPDATE")
                    .bind(id.0)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error(e, "set_occupier: lock row"))?;
            if previous.as_deref() == Some(faction.slug()) {
                return Ok(());
            }
            sqlx::query("UPDATE location SET occupier = $1 WHERE id = $2")
                .bind(faction.slug())
                .bind(id.0)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error(e, "set_occupier: update"))?;
            sqlx::query(
                "INSERT INTO ownership_record (day, location, event, faction) VALUES ($1, $2, 'occupy', $3)",
            )
            .bind(day.0)
            .bind(id.0)
            .bind(faction.slug())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(e, "set_occupier: audit"))?;
            tx.commit().await.map_err(|e| map_sqlx_error(e, "set_occupier: commit"))
        })
        .await
    }

    async fn clear_occupier(&self, id: LocationId, cancel: &CancellationToken) -> Result<(), StoreError> {
        guarded(cancel, async {
            sqlx::query("UPDATE location SET occupier = NULL WHERE id = $1")
                .bind(id.0)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(e, "clear_occupier"))?;
            Ok(())
        })
        .await
    }

    async fn locations_with_combat_today(
        &self,
        day: Day,
        cancel: &CancellationToken,
    ) -> Result<Vec<LocationId>, StoreError> {
        guarded(cancel, async {
            let rows: Vec<(i32,)> = sqlx::query_as(
                "SELECT DISTINCT location FROM combat_record WHERE day = $1",
            )
            .bind(day.0)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, "locations_with_combat_today"))?;
            Ok(rows.into_iter().map(|(l,)| LocationId(l)).collect())
        })
        .await
    }

    async fn create_combatant(
        &self,
        principal: &str,
        faction: Faction,
        cancel: &CancellationToken,
    ) -> Result<CombatantId, StoreError> {
        guarded(cancel, async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| map_sqlx_error(e, "create_combatant: begin"))?;
            let temple: (i32,) = sqlx::query_as("SELECT location FROM temple WHERE faction = $1")
                .bind(faction.slug())
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error(e, "create_combatant: temple lookup"))?;
            let row: (i64,) = sqlx::query_as(
                "INSERT INTO player (principal, faction, class, rank, experience, location, next_location, active, receive_updates)
                 VALUES ($1, $2, 'recruit', 1, 0, $3, $3, true, true)
                 RETURNING id",
            )
            .bind(principal)
            .bind(faction.slug())
            .bind(temple.0)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(e, "create_combatant: insert"))?;
            tx.commit()
                .await
                .map_err(|e| map_sqlx_error(e, "create_combatant: commit"))?;
            Ok(CombatantId(row.0))
        })
        .await
    }

    async fn find_active_by_principal(
        &self,
        principal: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Combatant>, StoreError> {
        guarded(cancel, async {
            let row: Option<CombatantRow> = sqlx::query_as(
                "SELECT id, principal, faction, class, rank, experience, location, next_location, active, receive_updates
                 FROM player WHERE principal = $1 AND active = true",
            )
            .bind(principal)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, "find_active_by_principal"))?;
            row.map(Combatant::try_from).transpose()
        })
        .await
    }

    async fn find_by_principal(
        &self,
        principal: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Combatant>, StoreError> {
        guarded(cancel, async {
            let row: Option<CombatantRow> = sqlx::query_as(
                "SELECT id, principal, faction, class, rank, experience, location, next_location, active, receive_updates
                 FROM player WHERE principal = $1",
            )
            .bind(principal)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, "find_by_principal"))?;
            row.map(Combatant::try_from).transpose()
        })
        .await
    }

    async fn deactivate(&self, id: CombatantId, cancel: &CancellationToken) -> Result<(), StoreError> {
        guarded(cancel, async {
            sqlx::query("UPDATE player SET active = false WHERE id = $1")
                .bind(id.0)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(e, "deactivate"))?;
            Ok(())
        })
        .await
    }

    async fn hard_delete(&self, id: CombatantId, cancel: &CancellationToken) -> Result<(), StoreError> {
        guarded(cancel, async {
            sqlx::query("DELETE FROM player WHERE id = $1")
                .bind(id.0)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(e, "hard_delete"))?;
            Ok(())
        })
        .await
    }

    async fn set_next_location(
        &self,
        id: CombatantId,
        destination: LocationId,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        guarded(cancel, async {
            sqlx::query("UPDATE player SET next_location = $1 WHERE id = $2")
                .bind(destination.0)
                .bind(id.0)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(e, "set_next_location"))?;
            Ok(())
        })
        .await
    }

    async fn commit_movement(&self, day: Day, cancel: &CancellationToken) -> Result<u64, StoreError> {
        guarded(cancel, async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| map_sqlx_error(e, "commit_movement: begin"))?;
            let moved: Vec<(i64, Option<i32>, i32)> = sqlx::query_as(
                "SELECT id, location, next_location FROM player
                 WHERE active = true AND next_location IS NOT NULL
                   AND location IS DISTINCT FROM next_location",
            )
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(e, "commit_movement: select"))?;

            for (id, before, after) in &moved {
                sqlx::query("UPDATE player SET location = $1 WHERE id = $2")
                    .bind(after)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error(e, "commit_movement: update"))?;
                sqlx::query(
                    "INSERT INTO move_record (day, location_before, location_after, combatant)
                     VALUES ($1, $2, $3, $4)",
                )
                .bind(day.0)
                .bind(before)
                .bind(after)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error(e, "commit_movement: audit"))?;
            }
            tx.commit()
                .await
                .map_err(|e| map_sqlx_error(e, "commit_movement: commit"))?;
            Ok(moved.len() as u64)
        })
        .await
    }

    async fn list_all(&self, cancel: &CancellationToken) -> Result<Vec<Combatant>, StoreError> {
        guarded(cancel, async {
            let rows: Vec<CombatantRow> = sqlx::query_as(
                "SELECT id, principal, faction, class, rank, experience, location, next_location, active, receive_updates
                 FROM player",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, "list_all"))?;
            rows.into_iter().map(Combatant::try_from).collect()
        })
        .await
    }

    async fn list_alive(&self, cancel: &CancellationToken) -> Result<Vec<Combatant>, StoreError> {
        guarded(cancel, async {
            let rows: Vec<CombatantRow> = sqlx::query_as(
                "SELECT id, principal, faction, class, rank, experience, location, next_location, active, receive_updates
                 FROM player WHERE active = true AND location IS NOT NULL",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, "list_alive"))?;
            rows.into_iter().map(Combatant::try_from).collect()
        })
        .await
    }

    async fn kill(&self, id: CombatantId, day: Day, cancel: &CancellationToken) -> Result<(), StoreError> {
        guarded(cancel, async {
            let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error(e, "kill: begin"))?;
            let before: Option<i32> = sqlx::query_scalar("SELECT location FROM player WHERE id = $1 FOR UPDATE")
                .bind(id.0)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error(e, "kill: lock row"))?;
            sqlx::query(
                "INSERT INTO move_record (day, location_before, location_after, combatant) VALUES ($1, $2, NULL, $3)",
            )
            .bind(day.0)
            .bind(before)
            .bind(id.0)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(e, "kill: audit"))?;
            sqlx::query("UPDATE player SET location = NULL, next_location = NULL WHERE id = $1")
                .bind(id.0)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error(e, "kill: update"))?;
            tx.commit().await.map_err(|e| map_sqlx_error(e, "kill: commit"))
        })
        .await
    }

    async fn revive_faction(&self, faction: Faction, day: Day, cancel: &CancellationToken) -> Result<u64, StoreError> {
        guarded(cancel, async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| map_sqlx_error(e, "revive_faction: begin"))?;
            let temple: (i32,) = sqlx::query_as("SELECT location FROM temple WHERE faction = $1")
                .bind(faction.slug())
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error(e, "revive_faction: temple lookup"))?;
            let dead: Vec<(i64,)> = sqlx::query_as(
                "SELECT id FROM player WHERE active = true AND faction = $1 AND location IS NULL",
            )
            .bind(faction.slug())
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(e, "revive_faction: select"))?;
            for (id,) in &dead {
                sqlx::query("UPDATE player SET location = $1, next_location = $1 WHERE id = $2")
                    .bind(temple.0)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error(e, "revive_faction: update"))?;
                sqlx::query(
                    "INSERT INTO move_record (day, location_before, location_after, combatant)
                     VALUES ($1, NULL, $2, $3)",
                )
                .bind(day.0)
                .bind(temple.0)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error(e, "revive_faction: audit"))?;
            }
            tx.commit()
                .await
                .map_err(|e| map_sqlx_error(e, "revive_faction: commit"))?;
            Ok(dead.len() as u64)
        })
        .await
    }

    async fn advance(
        &self,
        id: CombatantId,
        class: &str,
        rank: u16,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        guarded(cancel, async {
            sqlx::query(
                "UPDATE player SET class = $1, rank = $2, experience = experience - 100 WHERE id = $3",
            )
            .bind(class)
            .bind(rank as i32)
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, "advance"))?;
            Ok(())
        })
        .await
    }

    async fn add_experience(&self, id: CombatantId, delta: i32, cancel: &CancellationToken) -> Result<(), StoreError> {
        guarded(cancel, async {
            sqlx::query("UPDATE player SET experience = GREATEST(0, experience + $1) WHERE id = $2")
                .bind(delta)
                .bind(id.0)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(e, "add_experience"))?;
            Ok(())
        })
        .await
    }

    async fn toggle_updates(&self, id: CombatantId, cancel: &CancellationToken) -> Result<bool, StoreError> {
        guarded(cancel, async {
            let new_value: (bool,) = sqlx::query_as(
                "UPDATE player SET receive_updates = NOT receive_updates WHERE id = $1 RETURNING receive_updates",
            )
            .bind(id.0)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, "toggle_updates"))?;
            Ok(new_value.0)
        })
        .await
    }

    async fn get_day(&self, cancel: &CancellationToken) -> Result<Day, StoreError> {
        guarded(cancel, async {
            let row: (i64,) = sqlx::query_as("SELECT count FROM calendar")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(e, "get_day"))?;
            Ok(Day(row.0))
        })
        .await
    }

    async fn increment_day(&self, cancel: &CancellationToken) -> Result<Day, StoreError> {
        guarded(cancel, async {
            let row: (i64,) = sqlx::query_as("UPDATE calendar SET count = count + 1 RETURNING count")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(e, "increment_day"))?;
            Ok(Day(row.0))
        })
        .await
    }

    async fn append_combat_record(&self, record: &CombatRecord, cancel: &CancellationToken) -> Result<(), StoreError> {
        guarded(cancel, async {
            sqlx::query(
                "INSERT INTO combat_record (day, location, kind, attacker, defender, attacker_class, defender_class, result)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(record.day.0)
            .bind(record.location.0)
            .bind(kind_str(record.kind))
            .bind(record.attacker.0)
            .bind(record.defender.0)
            .bind(&record.attacker_class)
            .bind(&record.defender_class)
            .bind(result_str(record.result))
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, "append_combat_record"))?;
            Ok(())
        })
        .await
    }
}
