mod config;
mod error;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use runtime::{Orchestrator, Provider, ToolRegistry};
use tmdb::TmdbClient;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

use config::Config;
use error::Result;

const SYSTEM_PROMPT: &str = "You are Marquee, a movie assistant. Use the available functions \
to look up movies, details, popular titles and recommendations. Answer concisely and only \
from the data the functions return.";

#[derive(Parser)]
#[command(name = "marquee")]
#[command(about = "A movie chatbot backed by TMDB", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ./marquee.toml)
    #[arg(short, long, global = true, env = "MARQUEE_CONFIG")]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a single question
    Ask {
        /// The question, e.g. "movies like Heat"
        #[arg(required = true)]
        query: Vec<String>,
        /// Print the reply as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start an interactive chat
    Chat,
    /// List the functions offered to the model
    Tools,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let json = matches!(cli.command, Some(Commands::Ask { json: true, .. }));
    if let Err(e) = run(cli).await {
        if json {
            println!("{}", serde_json::json!({ "error": e.to_string() }));
        } else {
            eprintln!("Error: {e}");
        }
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Tools) => cmd_tools(),
        Some(Commands::Ask { query, json }) => {
            let orchestrator = build(cli.config)?;
            cmd_ask(&orchestrator, &query.join(" "), json).await
        }
        Some(Commands::Chat) | None => {
            let orchestrator = build(cli.config)?;
            cmd_chat(&orchestrator).await
        }
    }
}

fn build(config_path: Option<PathBuf>) -> Result<Orchestrator<Provider>> {
    let config = Config::discover(config_path.as_deref())?;
    let backend = config.backend(SYSTEM_PROMPT)?;
    let client = Arc::new(TmdbClient::new(config.tmdb()?)?);

    let mut registry = ToolRegistry::new();
    tmdb::register_movie_tools(&mut registry, client)?;

    tracing::info!(backend = %backend, tools = registry.len(), "orchestrator ready");
    Ok(Orchestrator::new(
        backend,
        Arc::new(registry),
        config.orchestrator(),
    ))
}

fn cmd_tools() -> Result<()> {
    for declaration in tmdb::movie_declarations() {
        println!("{}", declaration.name);
        println!("    {}", declaration.description);
        for param in &declaration.parameters {
            let marker = if param.required { "*" } else { "" };
            println!(
                "    - {}{marker} ({}): {}",
                param.name,
                param.kind.as_str(),
                param.description
            );
        }
    }
    Ok(())
}

async fn cmd_ask(orchestrator: &Orchestrator<Provider>, query: &str, json: bool) -> Result<()> {
    let answer = orchestrator.handle_query(query).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&answer.to_reply())?);
        return Ok(());
    }

    println!("{}", answer.reply);
    if let Some(data) = answer.data() {
        println!("\n{}", serde_json::to_string_pretty(data)?);
    }
    Ok(())
}

async fn cmd_chat(orchestrator: &Orchestrator<Provider>) -> Result<()> {
    println!("marquee v{}", env!("CARGO_PKG_VERSION"));
    println!("Model: {}", orchestrator.backend());
    println!("Type 'quit' or Ctrl+D to exit.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "exit" {
            break;
        }

        // Each line is answered on its own; nothing carries over.
        match orchestrator.handle_query(input).await {
            Ok(answer) => {
                println!("\n{}\n", answer.reply);
                if let Some(error) = answer.error() {
                    eprintln!("(function error: {error})\n");
                }
            }
            Err(e) => {
                eprintln!("Error: {e}\n");
            }
        }
    }

    println!();
    Ok(())
}
