use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shopping_list::{
    config::database_url_from_env,
    repository::{PgShoppingListRepository, ShoppingListRepository},
};
use sqlx::postgres::PgPoolOptions;

#[derive(Parser)]
#[command(name = "list-tool")]
#[command(about = "Operator tooling for the shopping list backend")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending schema migrations.
    Migrate,
    /// Create demo lists with items.
    Seed {
        #[arg(long, default_value_t = 3)]
        lists: u32,
        #[arg(long, default_value_t = 5)]
        items: u32,
    },
}

const DEMO_ITEMS: [&str; 8] = [
    "Milk", "Eggs", "Bread", "Butter", "Apples", "Coffee", "Rice", "Tomatoes",
];

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let database_url = database_url_from_env()?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .context("failed to connect to PostgreSQL")?;
    let repository = PgShoppingListRepository::new(pool);

    repository
        .init()
        .await
        .context("failed to run migrations")?;

    match cli.command {
        Command::Migrate => {
            println!("Migrations applied successfully");
            Ok(())
        }
        Command::Seed { lists, items } => seed(&repository, lists, items).await,
    }
}

async fn seed(repository: &PgShoppingListRepository, lists: u32, items: u32) -> Result<()> {
    for list_index in 1..=lists {
        let list = repository
            .create_list(&format!("Demo list {list_index}"))
            .await
            .with_context(|| format!("failed to create demo list {list_index}"))?;

        for item_index in 0..items {
            let name = DEMO_ITEMS[item_index as usize % DEMO_ITEMS.len()];
            let quantity = i32::try_from(item_index % 4 + 1).unwrap_or(1);
            repository
                .create_item(list.id, name, quantity)
                .await
                .with_context(|| format!("failed to add '{name}' to list {}", list.id))?;
        }

        println!("Seeded list {} with {items} items", list.id);
    }

    Ok(())
}
