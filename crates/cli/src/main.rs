//! Shoppingify CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations (schema + session store)
//! shoppingify-cli migrate
//!
//! # Seed the catalog from a dummyjson-style file or the live API
//! shoppingify-cli seed products --file products.json
//! shoppingify-cli seed products --from-dummyjson
//!
//! # Manage users
//! shoppingify-cli user create-staff -e staff@example.com --first-name Sam --last-name Lee
//! shoppingify-cli user set-password -e staff@example.com
//!
//! # Delete abandoned guests
//! shoppingify-cli guests purge --days 30
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "shoppingify-cli")]
#[command(author, version, about = "Shoppingify CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Manage guest identities
    Guests {
        #[command(subcommand)]
        action: GuestAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Import products with their categories and discounts
    Products {
        /// Path to a JSON file shaped like the dummyjson `/products` response
        #[arg(short, long, conflicts_with = "from_dummyjson")]
        file: Option<String>,

        /// Fetch products from dummyjson.com instead of a file
        #[arg(long)]
        from_dummyjson: bool,

        /// Maximum number of products to fetch from dummyjson.com
        #[arg(long, default_value_t = 100)]
        limit: u32,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a staff account for the admin chat
    CreateStaff {
        /// Email address
        #[arg(short, long)]
        email: String,

        #[arg(long, default_value = "Support")]
        first_name: String,

        #[arg(long, default_value = "Team")]
        last_name: String,

        /// Password (generated and printed when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Replace a user's password
    SetPassword {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// New password (generated and printed when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },
}

#[derive(Subcommand)]
enum GuestAction {
    /// Delete guests with no cart items and no chat messages
    Purge {
        /// Only delete guests older than this many days
        #[arg(long, default_value_t = 30)]
        days: i32,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Products {
                file,
                from_dummyjson,
                limit,
            } => {
                let source = match (file, from_dummyjson) {
                    (Some(path), _) => commands::seed::Source::File(path),
                    (None, true) => commands::seed::Source::DummyJson { limit },
                    (None, false) => return Err("pass --file <path> or --from-dummyjson".into()),
                };
                commands::seed::products(source).await?;
            }
        },
        Commands::User { action } => match action {
            UserAction::CreateStaff {
                email,
                first_name,
                last_name,
                password,
            } => {
                commands::user::create_staff(&email, &first_name, &last_name, password).await?;
            }
            UserAction::SetPassword { email, password } => {
                commands::user::set_password(&email, password).await?;
            }
        },
        Commands::Guests { action } => match action {
            GuestAction::Purge { days } => commands::guests::purge(days).await?,
        },
    }
    Ok(())
}
