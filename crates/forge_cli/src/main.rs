//! appforge CLI - drive the web app builder pipeline from a terminal.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "forge")]
#[command(about = "Chat-driven web app builder", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a workspace in the current directory
    Init,
    /// Project management
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },
    /// Send one message to a project
    Chat {
        /// Project id or name
        project: String,
        /// The message
        message: String,
        /// Answer without touching files
        #[arg(long)]
        discuss: bool,
        /// Treat as the first message (replace template files)
        #[arg(long)]
        first: bool,
        /// Attach an image (png, jpg, gif, webp)
        #[arg(long)]
        image: Vec<PathBuf>,
    },
    /// Approve the pending plan and implement it
    Approve {
        /// Project id or name
        project: String,
    },
    /// Reject the pending plan
    Reject {
        /// Project id or name
        project: String,
    },
    /// Show how a message would be classified
    Classify {
        /// The message
        text: String,
        /// Print the analysis as JSON
        #[arg(long)]
        json: bool,
    },
    /// Parse a raw model response (file or stdin)
    Parse {
        /// File holding the response; reads stdin when omitted
        file: Option<PathBuf>,
        /// Apply against an empty tree
        #[arg(long)]
        first: bool,
    },
    /// Version history
    Versions {
        #[command(subcommand)]
        command: VersionCommands,
    },
    /// Show the conversation memory of a project
    Context {
        /// Project id or name
        project: String,
    },
    /// Evict idle conversation contexts
    Gc,
}

#[derive(Subcommand)]
enum ProjectCommands {
    /// Create a project
    New {
        /// Project name
        name: String,
        /// Seed files from a directory
        #[arg(long)]
        from: Option<PathBuf>,
    },
    /// List projects
    List,
    /// Show a project's files
    Show {
        /// Project id or name
        project: String,
        /// Print file contents
        #[arg(long)]
        contents: bool,
    },
    /// Write a project's files to a directory
    Export {
        /// Project id or name
        project: String,
        /// Destination directory
        dest: PathBuf,
    },
    /// Delete a project and its history
    Delete {
        /// Project id or name
        project: String,
    },
}

#[derive(Subcommand)]
enum VersionCommands {
    /// List versions, newest first
    List {
        /// Project id or name
        project: String,
    },
    /// Save the current files as a named version
    Save {
        /// Project id or name
        project: String,
        /// Version name
        name: String,
    },
    /// Restore a version's files
    Restore {
        /// Project id or name
        project: String,
        /// Version id
        version: String,
    },
}

fn main() -> Result<()> {
    // Respects RUST_LOG (e.g. RUST_LOG=forge_core=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => commands::init::run(),
        Commands::Project { command } => match command {
            ProjectCommands::New { name, from } => commands::project::new(&name, from.as_deref()),
            ProjectCommands::List => commands::project::list(),
            ProjectCommands::Show { project, contents } => {
                commands::project::show(&project, contents)
            }
            ProjectCommands::Export { project, dest } => commands::project::export(&project, &dest),
            ProjectCommands::Delete { project } => commands::project::delete(&project),
        },
        Commands::Chat {
            project,
            message,
            discuss,
            first,
            image,
        } => commands::chat::run(&project, &message, discuss, first, &image),
        Commands::Approve { project } => commands::plan::approve(&project),
        Commands::Reject { project } => commands::plan::reject(&project),
        Commands::Classify { text, json } => commands::classify::run(&text, json),
        Commands::Parse { file, first } => commands::parse::run(file.as_deref(), first),
        Commands::Versions { command } => match command {
            VersionCommands::List { project } => commands::versions::list(&project),
            VersionCommands::Save { project, name } => commands::versions::save(&project, &name),
            VersionCommands::Restore { project, version } => {
                commands::versions::restore(&project, &version)
            }
        },
        Commands::Context { project } => commands::context::run(&project),
        Commands::Gc => commands::gc::run(),
    }
}
