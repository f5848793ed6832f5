#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![deny(warnings)]
#![allow(clippy::multiple_crate_versions)]

use anyhow::{bail, Context};
use authsync::{
    models::FlowKind, settings::AuthsyncSettings, storage::FileStore, utils::clock::SystemClock,
    IntentStore,
};
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    // Loads .env and Settings.toml, and initializes the logger
    let settings = AuthsyncSettings::load()
        .map_err(|e| anyhow::anyhow!("Failed to load settings: {e}"))?;

    let command = std::env::args().nth(1).unwrap_or_else(|| "status".to_string());
    let store = FileStore::new(&settings.storage.path);
    let intents = IntentStore::new(
        Arc::new(store),
        Arc::new(SystemClock),
        settings.intents.clone(),
    );

    match command.as_str() {
        "status" => print_status(&intents, &settings),
        "clear" => {
            intents.clear_all();
            println!("✓ Cleared pending flow state in {}", settings.storage.path);
            Ok(())
        }
        other => bail!("unknown command '{other}' (expected 'status' or 'clear')"),
    }
}

fn print_status(intents: &IntentStore, settings: &AuthsyncSettings) -> anyhow::Result<()> {
    println!("authsync {}", authsync::VERSION);
    println!("Intent store: {}", settings.storage.path);
    println!();

    for kind in FlowKind::ALL {
        let key = intents.key(kind);
        match intents.pending_record(kind) {
            Some(record) => {
                let started = chrono::DateTime::from_timestamp_millis(record.created_at)
                    .with_context(|| format!("{key} has an out-of-range timestamp"))?;
                println!(
                    "  {key:<28} pending since {} (max age {} ms)",
                    started.to_rfc3339(),
                    intents.max_age_ms(kind)
                );
            }
            None => println!("  {key:<28} -"),
        }
    }
    Ok(())
}
