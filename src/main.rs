use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tokio::io::BufReader;

use dreamos::commands::{self, AppContext};
use dreamos::services::llm_client::LanguageModel;
use dreamos::utils::config;

#[derive(Parser)]
#[command(name = "dreamos")]
#[command(about = "DreamOS study assistant")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Data directory (overrides DREAMOS_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Act as this user id instead of the configured one
    #[arg(long, global = true)]
    user: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Talk to Luna; scheduling requests go straight to the calendar
    Chat,
    /// Show how a message would be parsed as a scheduling request
    Parse {
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// List events for a day (YYYY-MM-DD, default today)
    Agenda { date: Option<NaiveDate> },
    /// Mark an event as completed
    Complete { id: String },
    /// Delete an event and its reminder
    Remove { id: String },
    /// Manage past chat sessions
    Sessions {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Show the effective settings
    Settings {
        /// Write a default settings file if none exists
        #[arg(long)]
        init: bool,
    },
}

#[derive(Subcommand)]
enum SessionCommands {
    /// List sessions, most recent first
    List,
    /// Delete a session and its messages
    Delete { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    config::load_dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let data_dir = config::resolve_data_dir(cli.data_dir.as_deref());
    log::debug!("using data dir {}", data_dir.display());

    let mut stdout = std::io::stdout();

    if let Commands::Settings { init: true } = cli.command {
        return commands::settings::init_settings(&data_dir, &mut stdout);
    }

    let ctx = AppContext::open(&data_dir, cli.user)?;

    match cli.command {
        Commands::Chat => {
            let model = ctx.language_model();
            if model.is_none() {
                log::warn!("AI is not configured; only scheduling requests will be handled");
            }
            let model = model.as_ref().map(|m| m as &dyn LanguageModel);
            let input = BufReader::new(tokio::io::stdin());
            commands::chat::run_chat(&ctx, model, input, &mut stdout).await
        }
        Commands::Parse { text } => commands::intent::print_parse(&ctx, &text.join(" "), &mut stdout),
        Commands::Agenda { date } => commands::schedule::print_agenda(&ctx, date, &mut stdout),
        Commands::Complete { id } => commands::schedule::complete_event(&ctx, &id, &mut stdout),
        Commands::Remove { id } => commands::schedule::remove_event(&ctx, &id, &mut stdout),
        Commands::Sessions { command } => match command {
            SessionCommands::List => commands::sessions::list_sessions(&ctx, &mut stdout),
            SessionCommands::Delete { id } => commands::sessions::delete_session(&ctx, &id, &mut stdout),
        },
        Commands::Settings { .. } => commands::settings::print_settings(&ctx.settings, &mut stdout),
    }
}
