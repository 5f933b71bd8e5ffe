//! TutorStitch CLI — the main entry point.
//!
//! Commands:
//! - `init`     — Write the default config
//! - `serve`    — Start the HTTP gateway
//! - `stitch`   — Stitch one message for a user and print the prompt
//! - `advance`  — Complete a user's current stage
//! - `show`     — Print a user's stored state
//! - `reset`    — Delete a user's stored state
//! - `demo`     — Run the scripted tutoring scenario in memory

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "tutorstitch",
    about = "TutorStitch — hierarchical context stitching for tutoring chatbots",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default config to ~/.tutorstitch/config.toml
    Init,

    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Stitch a message into a user's context and print the prompt
    Stitch {
        /// User key
        #[arg(short, long)]
        user: String,

        /// The user's message
        #[arg(short, long)]
        message: String,

        /// Location for a new user
        #[arg(short, long)]
        location: Option<String>,

        /// Starting stage for a new user
        #[arg(short, long)]
        stage: Option<u32>,
    },

    /// Record a milestone and move the user to the next stage
    Advance {
        #[arg(short, long)]
        user: String,

        /// Description of the completed milestone
        #[arg(short, long)]
        milestone: String,
    },

    /// Print a user's stored state as JSON
    Show {
        #[arg(short, long)]
        user: String,
    },

    /// Delete a user's stored state
    Reset {
        #[arg(short, long)]
        user: String,

        /// Actually delete (otherwise only reports what would happen)
        #[arg(long)]
        confirm: bool,
    },

    /// Run the scripted tutoring scenario against an in-memory store
    Demo,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Init => commands::init::run().await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Stitch {
            user,
            message,
            location,
            stage,
        } => commands::session::stitch(user, message, location, stage).await?,
        Commands::Advance { user, milestone } => {
            commands::session::advance(&user, &milestone).await?
        }
        Commands::Show { user } => commands::session::show(&user).await?,
        Commands::Reset { user, confirm } => commands::session::reset(&user, confirm).await?,
        Commands::Demo => commands::demo::run().await?,
    }

    Ok(())
}
