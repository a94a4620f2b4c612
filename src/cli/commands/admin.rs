use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};

use crate::admin::MAX_INVITE_TTL_HOURS;

pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";
pub const ARG_INVITE_TTL_HOURS: &str = "invite-ttl-hours";
pub const ARG_DB_MAX_CONNECTIONS: &str = "db-max-connections";

#[derive(Debug)]
pub struct Options {
    pub frontend_base_url: String,
    pub invite_ttl_hours: i64,
    pub db_max_connections: u32,
}

impl Options {
    /// Read the administration options out of validated matches.
    ///
    /// # Errors
    /// Returns an error if a defaulted argument is somehow absent.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let frontend_base_url = matches
            .get_one::<String>(ARG_FRONTEND_BASE_URL)
            .cloned()
            .context("missing required argument: --frontend-base-url")?;
        let invite_ttl_hours = matches
            .get_one::<i64>(ARG_INVITE_TTL_HOURS)
            .copied()
            .context("missing required argument: --invite-ttl-hours")?;
        let db_max_connections = matches
            .get_one::<u32>(ARG_DB_MAX_CONNECTIONS)
            .copied()
            .context("missing required argument: --db-max-connections")?;

        Ok(Self {
            frontend_base_url,
            invite_ttl_hours,
            db_max_connections,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend base URL used for invite links")
                .env("MONETIZEKIT_FRONTEND_BASE_URL")
                .default_value("http://localhost:3000"),
        )
        .arg(
            Arg::new(ARG_INVITE_TTL_HOURS)
                .long(ARG_INVITE_TTL_HOURS)
                .help("Invite lifetime in hours")
                .env("MONETIZEKIT_INVITE_TTL_HOURS")
                .default_value("168")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_INVITE_TTL_HOURS)),
        )
        .arg(
            Arg::new(ARG_DB_MAX_CONNECTIONS)
                .long(ARG_DB_MAX_CONNECTIONS)
                .help("Maximum number of pooled database connections")
                .env("MONETIZEKIT_DB_MAX_CONNECTIONS")
                .default_value("5")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
}
