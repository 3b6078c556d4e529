//! # Seed Data Generator
//!
//! Populates the to-do collection with sample items for development.
//!
//! ## Usage
//! ```bash
//! # Seed 20 items into the configured account
//! cargo run -p todo-docdb --bin seed
//!
//! # Custom amount, explicit settings file
//! cargo run -p todo-docdb --bin seed -- --count 50 --config ./todo.toml
//!
//! # Try it without an account
//! cargo run -p todo-docdb --bin seed -- --memory
//! ```
//!
//! Every third item is created already completed, so the incomplete
//! listing at the end shows roughly two thirds of what was seeded.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use todo_core::Item;
use todo_docdb::settings::{AUTH_KEY_KEY, COLLECTION_KEY, DATABASE_KEY, ENDPOINT_KEY};
use todo_docdb::{AppSettings, ConnectionContext, InMemoryStore, ItemRepository};
use tracing_subscriber::EnvFilter;

/// Sample tasks, cycled when more items are requested.
const TASKS: &[&str] = &[
    "Buy milk",
    "Walk the dog",
    "Pay electricity bill",
    "Book dentist appointment",
    "Water the plants",
    "Renew passport",
    "Call grandma",
    "Clean the garage",
    "Fix the leaking tap",
    "Return library books",
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 20;
    let mut memory = false;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(20);
                    i += 1;
                }
            }
            "--memory" | "-m" => memory = true,
            "--config" | "-f" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("To-Do Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>      Number of items to create (default: 20)");
                println!("  -m, --memory         Use an in-memory store instead of the service");
                println!("  -f, --config <PATH>  Settings file (default: platform config dir)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let context = if memory {
        let settings = AppSettings::from_pairs([
            (DATABASE_KEY, "ToDoList"),
            (COLLECTION_KEY, "Items"),
            (ENDPOINT_KEY, "https://localhost/"),
            (AUTH_KEY_KEY, "bWVtb3J5"),
        ]);
        ConnectionContext::with_connector(settings, Arc::new(Arc::new(InMemoryStore::new())))
    } else {
        ConnectionContext::new(AppSettings::load(config_path)?)
    };
    let repo = ItemRepository::new(Arc::new(context));

    println!("🌱 To-Do Seed Data Generator");
    println!("============================");
    println!("Store:    {}", if memory { "in-memory" } else { "remote" });
    println!("Target:   {}", repo.context().collection_link()?);
    println!("Items:    {}", count);
    println!();

    // Resolves (and if needed creates) the database and collection
    repo.context().collection().await?;
    println!("✓ Collection ready");

    let existing = repo.get_incomplete_items().await?.len();
    if existing > 0 {
        println!("⚠ Collection already has {} open items", existing);
        println!();
    }

    println!("Creating items...");
    let start = std::time::Instant::now();
    let mut created = 0;

    for index in 0..count {
        let description = format!("{} #{}", TASKS[index % TASKS.len()], index + 1);
        let mut item = Item::new(description);
        item.completed = index % 3 == 2;

        if let Err(e) = repo.create_item(&item).await {
            eprintln!("Failed to create {}: {}", item.id, e);
            continue;
        }
        created += 1;
    }

    let elapsed = start.elapsed();
    println!("✓ Created {} items in {:?}", created, elapsed);

    println!();
    println!("Incomplete items:");
    for item in repo.get_incomplete_items().await? {
        println!("  [ ] {}  ({})", item.description, item.id);
    }

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
