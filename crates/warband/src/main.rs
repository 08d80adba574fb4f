//! `sim`: the Warband territorial combat simulation binary.
//!
//! Three subcommands: `migrate` applies pending schema migrations and the
//! map seed; `tick` runs one or more day-advances immediately (for demos
//! and manual operation); `serve` runs the daily scheduler loop, ticking
//! once at every UTC midnight boundary until interrupted.
//!
//! The HTTPS webhook front door, the outbound messaging client, and the
//! periodic scheduler *trigger* itself are out of scope (spec §1) — the
//! loop below is the minimal driver `warband-engine::TickEngine` needs to
//! run at all, not an implementation of that out-of-scope collaborator.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use warband::{Config, TracingSink, World};

#[derive(Subcommand)]
enum Command {
    /// Apply pending database migrations (schema + map seed) and exit.
    Migrate,
    /// Run the daily tick immediately, `count` times in a row.
    Tick {
        /// Number of ticks to run before exiting.
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
    /// Run forever, ticking once at every UTC midnight boundary.
    Serve,
}

#[derive(Parser)]
struct Cli {
    #[command(flatten)]
    config: Config,
    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(cli.config.log_filter()))
        .init();

    if matches!(cli.command, Command::Migrate) {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect(&cli.config.database_url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("migrations applied");
        return Ok(());
    }

    let seed_offset = std::process::id() as u64;
    let world = World::connect(&cli.config.database_url, TracingSink::new(), seed_offset).await?;

    match cli.command {
        Command::Migrate => unreachable!("handled above"),
        Command::Tick { count } => {
            for _ in 0..count {
                let day = world.tick().await?;
                tracing::info!(day = day.0, "tick complete");
            }
        }
        Command::Serve => loop {
            tokio::time::sleep(duration_until_next_midnight_utc()).await;
            match world.tick().await {
                Ok(day) => tracing::info!(day = day.0, "scheduled tick complete"),
                Err(e) => tracing::error!(error = %e, "scheduled tick failed; will retry tomorrow"),
            }
        },
    }

    Ok(())
}

/// Seconds from now until the next UTC midnight boundary.
fn duration_until_next_midnight_utc() -> std::time::Duration {
    use chrono::{Duration as ChronoDuration, NaiveTime, Utc};

    let now = Utc::now();
    let midnight = NaiveTime::from_hms_opt(0, 0, 0).expect("valid time");
    let today_midnight = now.date_naive().and_time(midnight).and_utc();
    let next_midnight = if now < today_midnight {
        today_midnight
    } else {
        today_midnight + ChronoDuration::days(1)
    };
    (next_midnight - now).to_std().unwrap_or(std::time::Duration::from_secs(1))
}
