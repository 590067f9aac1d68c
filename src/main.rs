//! Pantry Tracker CLI
//!
//! Runs one pantry command against the local database, or serves the HTTP API.

use chrono::Local;
use clap::Parser;
use pantry_tracker::config::{Cli, Command, Config};
use pantry_tracker::{
    require_owner, Category, ItemId, ListQuery, OwnerId, Pantry, RawCandidate, SessionIdentity,
};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config::from_cli(&cli);

    log::debug!("Database path: {}", config.database.display());

    if let Command::Categories = cli.command {
        for category in Category::ALL {
            println!("{}", category);
        }
        return;
    }

    let pantry = match Pantry::open(&config) {
        Ok(pantry) => pantry,
        Err(e) => {
            log::error!("Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    if let Command::Serve { port, bind } = &cli.command {
        if let Err(e) = pantry_tracker::web::serve(Arc::new(pantry), bind, *port).await {
            log::error!("Web server error: {}", e);
            std::process::exit(1);
        }
        return;
    }

    let identity = SessionIdentity::new(None);
    if let Some(owner) = config.owner.clone() {
        identity.sign_in(owner);
    }
    let owner = match require_owner(&identity) {
        Ok(owner) => owner,
        Err(e) => {
            log::error!("{} (pass --owner or set PANTRY_OWNER)", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&pantry, &owner, cli.command) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

/// Run a single owner-scoped command
fn run(pantry: &Pantry, owner: &OwnerId, command: Command) -> pantry_tracker::Result<()> {
    match command {
        Command::Add(args) => {
            let submission = pantry.submit(owner, &RawCandidate::from(args))?;
            println!(
                "{} #{} {} (quantity {})",
                submission.action, submission.item.id, submission.item.name, submission.item.quantity
            );
        }
        Command::Edit { id, item } => {
            let item = pantry.edit(owner, ItemId(id), &RawCandidate::from(item))?;
            println!("updated #{} {} (quantity {})", item.id, item.name, item.quantity);
        }
        Command::Delete { id } => {
            pantry.delete(owner, ItemId(id))?;
            println!("deleted #{}", id);
        }
        Command::List {
            search,
            category,
            sort,
        } => {
            let query = ListQuery::parse(&search, category.as_deref().unwrap_or(""), &sort)?;
            let listed = pantry.list(owner, &query, Local::now().naive_local())?;
            if listed.is_empty() {
                println!("No items");
            }
            for entry in listed {
                let item = &entry.item;
                println!(
                    "{:>5}  {:<24} {:>6}  {}  {:<10} {}",
                    item.id,
                    item.name,
                    item.quantity,
                    item.expiry_date,
                    item.category,
                    entry.status
                );
            }
        }
        Command::History => {
            for entry in pantry.history(owner)? {
                println!(
                    "{}  {:<7} {:<24} {:>6}  {}  {}",
                    entry.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
                    entry.action,
                    entry.item_name,
                    entry.item_quantity,
                    entry.expiry_date,
                    entry.category
                );
            }
        }
        Command::Categories | Command::Serve { .. } => {}
    }
    Ok(())
}
