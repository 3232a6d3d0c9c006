use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "taskdeck")]
#[command(version, about = "Per-user Kanban board with AI task generation")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Skip confirmation prompts
    #[arg(long, global = true)]
    pub yes: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Sign in as this user. Without it the board is transient and never saved.
    #[arg(short, long, global = true)]
    pub user: Option<String>,

    /// Database path. Overrides TASKDECK_DB and taskdeck.toml.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the board
    Board,
    /// Move a task to a column (id or title)
    Move { task: String, column: String },
    /// Move a task one column to the right
    Forward { task: String },
    /// Move a task one column to the left
    Back { task: String },
    /// Generate tasks from a project idea and add them to To Do
    Generate {
        prompt: String,
        /// Generate a single task instead of a full breakdown
        #[arg(long)]
        single: bool,
    },
    /// Generate an actionable prompt for a task and store it on the card
    Prompt { task: String },
    /// Replace the board with the empty default
    Reset,
    /// Create an account with an empty board and sign in
    Signup { user: String },
    /// List stored users, or delete one
    Users {
        /// Delete this user's stored board
        #[arg(long)]
        delete: Option<String>,
    },
    /// View or initialize configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Write a default taskdeck.toml
    Init,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("taskdeck=debug")
        } else {
            EnvFilter::new("taskdeck=warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Board => cmd::cmd_board(&project_dir, &cli).await?,
        Commands::Move { task, column } => {
            cmd::cmd_move(&project_dir, &cli, task, column).await?
        }
        Commands::Forward { task } => cmd::cmd_step(&project_dir, &cli, task, true).await?,
        Commands::Back { task } => cmd::cmd_step(&project_dir, &cli, task, false).await?,
        Commands::Generate { prompt, single } => {
            cmd::cmd_generate(&project_dir, &cli, prompt, *single).await?
        }
        Commands::Prompt { task } => cmd::cmd_prompt(&project_dir, &cli, task).await?,
        Commands::Reset => cmd::cmd_reset(&project_dir, &cli).await?,
        Commands::Signup { user } => cmd::cmd_signup(&project_dir, &cli, user).await?,
        Commands::Users { delete } => {
            cmd::cmd_users(&project_dir, &cli, delete.as_deref()).await?
        }
        Commands::Config { command } => cmd::cmd_config(&project_dir, command.clone())?,
    }

    Ok(())
}
