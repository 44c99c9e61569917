use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use context_journal::{
    api, mcp,
    models::{CommitStatus, EntryContent, Project},
    summarizer::{AnthropicSummarizer, ReliableSummarizer},
    vcs::GitSink,
    Config, Engine,
};

#[derive(Parser)]
#[command(name = "ctxj")]
#[command(about = "Durable project journal with summarizing compaction")]
struct Cli {
    /// Config file (defaults to config.json in the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory containing projects (defaults to the current directory)
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    /// Project directory name under the workspace; the workspace itself when
    /// omitted
    #[arg(short, long, global = true)]
    project: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a new journal generation for the project
    Start,
    /// Append an entry to the journal
    Append {
        /// Entry text
        text: String,
        /// Parse the text as a JSON document
        #[arg(long)]
        json: bool,
    },
    /// Print journal entries
    Log {
        /// Only the most recent N entries
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Print the current snapshot
    Snapshot,
    /// Fold new entries into the snapshot and commit it
    Compact,
    /// Retry the commit of a snapshot whose commit failed
    Recommit,
    /// Show whether the snapshot is committed
    Status,
    /// Start the HTTP API
    Serve {
        /// Port for HTTP API
        #[arg(long, default_value = "3000")]
        port: u16,
    },
    /// Start MCP server via stdio
    Mcp,
}

/// Initialize tracing with output to stderr (for MCP mode) or stdout
fn init_tracing(use_stderr: bool) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "context_journal=info".into()),
    );

    if use_stderr {
        // stdout carries command output or the MCP protocol
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn build_engine(config: Config) -> anyhow::Result<Arc<Engine>> {
    let summarizer = AnthropicSummarizer::new(&config.summarizer)
        .context("Failed to set up the summarizer client")?;
    let summarizer = ReliableSummarizer::new(summarizer, config.summarizer.retry_policy());
    let vcs = GitSink::new(&config.vcs);
    Ok(Arc::new(Engine::new(config, Arc::new(summarizer), Arc::new(vcs))))
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let use_stderr = !matches!(cli.command, Commands::Serve { .. });
    init_tracing(use_stderr);

    let config = Config::load(cli.config.as_deref())?;
    let workspace = match cli.workspace {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to resolve current directory")?,
    };
    let project = match &cli.project {
        Some(name) => Project::in_workspace(&workspace, name)?,
        None => Project::from_dir(&workspace),
    };
    let engine = build_engine(config)?;

    match cli.command {
        Commands::Start => {
            let generation = engine.start_journal(&project).await?;
            println!("{}", generation);
        }
        Commands::Append { text, json } => {
            let content = if json {
                EntryContent::Structured(
                    serde_json::from_str(&text).context("Entry is not valid JSON")?,
                )
            } else {
                EntryContent::Text(text)
            };
            let entry = engine.append_entry(&project, content).await?;
            println!("{} #{}", entry.generation, entry.ordinal);
        }
        Commands::Log { limit } => {
            let entries = engine.read_journal(&project)?;
            let skip = limit.map_or(0, |n| entries.len().saturating_sub(n));
            for entry in entries.iter().skip(skip) {
                println!("{}", entry.render());
            }
        }
        Commands::Snapshot => {
            let snapshot = engine.read_snapshot(&project)?;
            println!("{}", snapshot.content);
        }
        Commands::Compact => {
            let outcome = engine.compact(&project).await?;
            print_json(&outcome)?;
        }
        Commands::Recommit => {
            let commit_id = engine.retry_commit(&project).await?;
            println!("{}", commit_id);
        }
        Commands::Status => {
            let status = engine.commit_status(&project).await?;
            if let CommitStatus::Pending { message } = &status {
                eprintln!("Snapshot is not committed yet; run `ctxj recommit` ({})", message);
            }
            print_json(&status)?;
        }
        Commands::Serve { port } => {
            tracing::info!("Starting context-journal server on port {}", port);

            let app = api::create_router(api::AppState::new(engine, workspace));

            let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
            tracing::info!(
                "context-journal server listening on http://127.0.0.1:{}",
                port
            );

            axum::serve(listener, app).await?;
        }
        Commands::Mcp => {
            mcp::run_stdio_server(engine, project).await?;
        }
    }

    Ok(())
}
