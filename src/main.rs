mod client;
mod commands;
mod desktop;
mod parse;
mod render;

use anyhow::{Context, Result};
use calnotify_core::window::Period;
use calnotify_core::{Settings, logging};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::client::Client;
use crate::commands::events::EventArgs;

#[derive(Parser)]
#[command(name = "calnotify")]
#[command(about = "Manage calendar events and run the calnotify reminder workers", version)]
struct Cli {
    /// Config file (defaults to ~/.config/calnotify/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Server address, overrides server.bind
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an event
    Add {
        header: String,

        /// When the event happens (e.g. "2026-03-20T15:00" or RFC 3339)
        #[arg(short, long)]
        at: String,

        /// Event id (random if omitted)
        #[arg(long)]
        id: Option<String>,

        #[command(flatten)]
        fields: EventFields,
    },
    /// Change an existing event
    Update {
        id: String,

        /// New title
        #[arg(long)]
        header: Option<String>,

        /// New start time
        #[arg(short, long)]
        at: Option<String>,

        /// Give the event a new id
        #[arg(long)]
        rename: Option<String>,

        #[command(flatten)]
        fields: EventFields,
    },
    /// Delete an event
    Remove { id: String },
    /// Show a single event
    Show { id: String },
    /// Events of the day containing --at (default today)
    Day {
        #[arg(short, long)]
        at: Option<String>,
    },
    /// Events of the seven days starting with --at
    Week {
        #[arg(short, long)]
        at: Option<String>,
    },
    /// Events of the month starting with --at
    Month {
        #[arg(short, long)]
        at: Option<String>,
    },
    /// Run the dispatcher as a standalone worker
    Dispatch {
        /// Scan once and exit
        #[arg(long)]
        once: bool,
    },
    /// Print notifications as they arrive
    Notify {
        /// Show desktop notifications instead of printing
        #[arg(long)]
        desktop: bool,
    },
    /// Inspect or create the config file
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Args)]
struct EventFields {
    /// Length of the event (e.g. "30m", "1h 30m"; default 1h on add)
    #[arg(short, long)]
    duration: Option<String>,

    /// Minutes before the start at which to notify
    #[arg(short, long)]
    lead: Option<i32>,

    #[arg(long)]
    owner: Option<String>,

    #[arg(long)]
    description: Option<String>,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the config and database paths
    Path,
    /// Write a commented default config file
    Init {
        #[arg(long)]
        force: bool,
    },
}

impl EventFields {
    fn into_args(self, header: Option<String>, at: Option<String>) -> EventArgs {
        EventArgs {
            header,
            at,
            duration: self.duration,
            lead: self.lead,
            owner: self.owner,
            description: self.description,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let load_settings = || -> Result<Settings> {
        let settings = Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;
        logging::init_logging(&settings.log);
        Ok(settings)
    };

    match cli.command {
        // Must not go through Settings::load, which writes the default file
        Commands::Config {
            command: ConfigCommand::Init { force },
        } => commands::config::init(cli.config.as_deref(), force),
        Commands::Config {
            command: ConfigCommand::Path,
        } => commands::config::path(cli.config.as_deref(), &load_settings()?),
        Commands::Dispatch { once } => commands::dispatch::run(&load_settings()?, once).await,
        Commands::Notify { desktop } => commands::notify::run(&load_settings()?, desktop).await,
        command => {
            let settings = load_settings()?;
            let bind = cli.server.unwrap_or(settings.server.bind);
            let client = Client::connect(&bind).await?;
            run_client_command(&client, command).await
        }
    }
}

async fn run_client_command(client: &Client, command: Commands) -> Result<()> {
    match command {
        Commands::Add { header, at, id, fields } => {
            commands::events::add(client, id, header, at, fields.into_args(None, None)).await
        }
        Commands::Update {
            id,
            header,
            at,
            rename,
            fields,
        } => commands::events::update(client, id, rename, fields.into_args(header, at)).await,
        Commands::Remove { id } => commands::events::remove(client, id).await,
        Commands::Show { id } => commands::events::show(client, id).await,
        Commands::Day { at } => commands::window::run(client, Period::Daily, at).await,
        Commands::Week { at } => commands::window::run(client, Period::Weekly, at).await,
        Commands::Month { at } => commands::window::run(client, Period::Monthly, at).await,
        Commands::Dispatch { .. } | Commands::Notify { .. } | Commands::Config { .. } => Ok(()),
    }
}
