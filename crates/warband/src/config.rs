//! Process configuration, loaded from the environment (spec §6's
//! enumerated options).
//!
//! The webhook front door, the outbound messaging client, and the
//! scheduler trigger are out of scope (spec §1), but their configuration
//! surface is carried here regardless: dropping the fields a collaborator
//! would need just because the collaborator isn't implemented yet would
//! shrink the ambient configuration layer, which `SPEC_FULL.md` doesn't
//! permit.

use clap::Args;

/// Complete process configuration.
///
/// Loaded via `clap`'s `env` feature: every field can be set by flag or by
/// its documented environment variable, the same dual-source pattern used
/// for CLI configuration across the example pack. Flattened into the
/// `sim` binary's top-level `Cli` rather than parsed standalone.
#[derive(Args, Clone, Debug)]
pub struct Config {
    /// Postgres connection string for the durable [`warband_store::Store`].
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Domain(s) the out-of-scope webhook front door listens on. Carried
    /// here as ambient configuration even though no HTTP server is
    /// implemented by this crate.
    #[arg(long, env = "LISTENER_DOMAIN")]
    pub listener_domain: Option<String>,

    /// Public path the out-of-scope webhook front door exposes.
    #[arg(long, env = "WEBHOOK_PATH", default_value = "/webhook")]
    pub webhook_path: String,

    /// Which environment the out-of-scope outbound messaging client
    /// targets (e.g. `production`, `staging`).
    #[arg(long, env = "MESSAGING_ENV")]
    pub messaging_env: Option<String>,

    /// OAuth1 consumer key for the out-of-scope messaging client.
    #[arg(long, env = "MESSAGING_CONSUMER_KEY")]
    pub messaging_consumer_key: Option<String>,

    /// OAuth1 consumer secret for the out-of-scope messaging client.
    #[arg(long, env = "MESSAGING_CONSUMER_SECRET")]
    pub messaging_consumer_secret: Option<String>,

    /// OAuth1 access token for the out-of-scope messaging client.
    #[arg(long, env = "MESSAGING_ACCESS_TOKEN")]
    pub messaging_access_token: Option<String>,

    /// OAuth1 access token secret for the out-of-scope messaging client.
    #[arg(long, env = "MESSAGING_ACCESS_TOKEN_SECRET")]
    pub messaging_access_token_secret: Option<String>,

    /// Verbose logging. Maps to a `debug`-level `tracing` filter when set.
    #[arg(long, env = "DEBUG", default_value_t = false)]
    pub debug: bool,
}

impl Config {
    /// Build the `tracing-subscriber` `EnvFilter` directive implied by
    /// `debug`, honoring `RUST_LOG` if the caller has set it explicitly.
    pub fn log_filter(&self) -> String {
        std::env::var("RUST_LOG").unwrap_or_else(|_| {
            if self.debug {
                "warband=debug,info".to_string()
            } else {
                "warband=info,warn".to_string()
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_filter_is_more_verbose_with_debug_set() {
        std::env::remove_var("RUST_LOG");
        let quiet = Config {
            database_url: "postgres://x".into(),
            listener_domain: None,
            webhook_path: "/webhook".into(),
            messaging_env: None,
            messaging_consumer_key: None,
            messaging_consumer_secret: None,
            messaging_access_token: None,
            messaging_access_token_secret: None,
            debug: false,
        };
        let mut verbose = quiet.clone();
        verbose.debug = true;
        assert_eq!(quiet.log_filter(), "warband=info,warn");
        assert_eq!(verbose.log_filter(), "warband=debug,info");
    }
}
