//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the
//! appropriate action, such as starting the API server with its full
//! configuration state.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{otp, twilio};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;
    let frontend_base_url = matches
        .get_one::<String>("frontend-url")
        .cloned()
        .unwrap_or_else(|| "http://localhost:5173".to_string());

    let otp_opts = otp::Options::parse(matches)?;
    let twilio_opts = twilio::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        frontend_base_url,
        otp: otp_opts,
        twilio: twilio_opts,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dsn_required() {
        temp_env::with_vars([("ENTRADA_DSN", None::<&str>)], || {
            let command = crate::cli::commands::new();
            let result = command.try_get_matches_from(vec!["entrada"]);
            assert!(result.is_err());
        });
    }

    #[test]
    fn full_args_build_server_action() -> Result<()> {
        temp_env::with_vars([("ENTRADA_DSN", None::<&str>)], || -> Result<()> {
            let command = crate::cli::commands::new();
            let matches = command.get_matches_from(vec![
                "entrada",
                "--dsn",
                "postgres://user@localhost:5432/entrada",
                "--port",
                "9000",
                "--otp-length",
                "8",
            ]);
            let Action::Server(args) = handler(&matches)?;
            assert_eq!(args.port, 9000);
            assert_eq!(args.dsn, "postgres://user@localhost:5432/entrada");
            assert_eq!(args.otp.length, 8);
            assert!(!args.twilio.configured());
            Ok(())
        })
    }
}
