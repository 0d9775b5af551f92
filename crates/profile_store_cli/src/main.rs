//! Operator entry point for the profile store.
//!
//! # Responsibility
//! - Open a store from `PROFILE_STORE_*` environment configuration.
//! - Run one maintenance subcommand and report plain-text results.
//!
//! Usage: `profile_store <ping|seed|stats|reconcile [user_id]>`

use log::error;
use profile_store_core::fixtures::{seed_demo_profiles, SeedOutcome};
use profile_store_core::{
    default_log_level, init_logging, Collection, DocumentStore, ProfileStore, StoreConfig,
};
use std::process::ExitCode;

const ENV_LOG_LEVEL: &str = "PROFILE_STORE_LOG";
const ENV_LOG_DIR: &str = "PROFILE_STORE_LOG_DIR";
const USAGE: &str = "usage: profile_store <ping|seed|stats|reconcile [user_id]>";

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        eprintln!("{USAGE}");
        return ExitCode::from(2);
    };

    let level = std::env::var(ENV_LOG_LEVEL).unwrap_or_else(|_| default_log_level().to_string());
    let log_dir = std::env::var(ENV_LOG_DIR).ok();
    if let Err(err) = init_logging(&level, log_dir.as_deref()) {
        eprintln!("logging disabled: {err}");
    }

    match run(command, &args[1..]) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("event=cli_command module=cli status=error command={command} error={message}");
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: &str, rest: &[String]) -> Result<(), String> {
    let config = StoreConfig::from_env().map_err(|err| err.to_string())?;
    let store = ProfileStore::open(&config).map_err(|err| err.to_string())?;

    match command {
        "ping" => {
            store.ping().map_err(|err| err.to_string())?;
            println!("profile_store ping=ok version={}", profile_store_core::core_version());
        }
        "seed" => match seed_demo_profiles(&store).map_err(|err| err.to_string())? {
            SeedOutcome::Skipped => println!("seed skipped: customers already present"),
            SeedOutcome::Seeded { customers } => println!("seeded {customers} customers"),
        },
        "stats" => {
            for collection in Collection::ALL {
                let count = store
                    .store()
                    .find_all(collection, u32::MAX)
                    .map_err(|err| err.to_string())?
                    .len();
                println!("{collection}={count}");
            }
        }
        "reconcile" => {
            let reports = match rest.first() {
                Some(id) => vec![(
                    id.clone(),
                    store.reconcile_user(id).map_err(|err| err.to_string())?,
                )],
                None => store.reconcile_all().map_err(|err| err.to_string())?,
            };
            for (user_id, report) in reports {
                println!(
                    "{user_id} pruned_cards={} pruned_addresses={}",
                    report.pruned_cards.len(),
                    report.pruned_addresses.len()
                );
            }
        }
        other => return Err(format!("unknown command `{other}`\n{USAGE}")),
    }
    Ok(())
}
