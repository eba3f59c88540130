mod commands;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use shepherd::{prompts, Agent, AgentRuntimeConfig, Config, Runtime};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::{parse_command, Outcome};

/// Shepherd - a terminal coding assistant with background shells and sub-agents
#[derive(Parser, Debug)]
#[command(name = "shepherd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Working directory
    #[arg(short, long)]
    working_dir: Option<PathBuf>,

    /// Provider name or alias (claude, sonnet, deepseek, ds, grok, xai)
    #[arg(short, long, env = "SHEPHERD_PROVIDER")]
    provider: Option<String>,

    /// Model override
    #[arg(short, long)]
    model: Option<String>,

    /// Run a single prompt and exit
    #[arg(long)]
    prompt: Option<String>,
}

/// Run one request, turning Ctrl-C into cancellation
async fn run_request(runtime: &Arc<Runtime>, agent: &mut Agent, input: &str) -> Result<String> {
    runtime.cancel().reset();
    let chat = agent.chat(input);
    tokio::pin!(chat);
    let result = loop {
        tokio::select! {
            result = &mut chat => break result,
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\nCancelling...");
                runtime.cancel().cancel();
            }
        }
    };
    Ok(result?)
}

fn print_usage(runtime: &Runtime, agent: &Agent) {
    if runtime.config().show_tokens {
        let usage = agent.total_usage();
        println!("[session] {}", runtime.adapter().format_usage(&usage));
    }
}

async fn repl(runtime: &Arc<Runtime>, agent: &mut Agent) -> Result<()> {
    println!("{}", prompts::WELCOME_MESSAGE);
    println!("{}", agent.provider_info());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read input")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if input.starts_with('/') {
            match parse_command(input) {
                Ok(command) => match command.execute(runtime, agent).await {
                    Outcome::Print(text) => println!("{}", text),
                    Outcome::Quit => break,
                },
                Err(e) => println!("{}", e),
            }
            continue;
        }

        match run_request(runtime, agent, input).await {
            Ok(response) => {
                println!("{}", response);
                print_usage(runtime, agent);
            },
            Err(e) => eprintln!("Error: {:#}", e),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Set up file-based logging
    let log_file = std::fs::File::create("/tmp/shepherd.log")?;
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("SHEPHERD_LOG").unwrap_or_else(|_| EnvFilter::new("debug")))
        .with(fmt::layer().with_writer(log_file).with_ansi(false))
        .init();

    // Load .env files (local first, then home directory)
    // Errors are ignored - files are optional
    let _ = dotenvy::from_filename(".env");
    if let Some(home) = dirs::home_dir() {
        let _ = dotenvy::from_path(home.join(".env"));
    }

    let args = Args::parse();

    let mut config = Config::load()?;

    // Apply CLI overrides
    if let Some(working_dir) = args.working_dir {
        config.general.working_dir = Some(working_dir);
    }
    if let Some(provider) = args.provider {
        // A new provider brings its own default model unless one is given
        config.general.provider = provider;
        config.general.model = None;
    }
    if let Some(model) = args.model {
        config.general.model = Some(model);
    }

    if let Some(ref working_dir) = config.general.working_dir {
        std::env::set_current_dir(working_dir)
            .with_context(|| format!("Failed to enter {}", working_dir.display()))?;
    }

    let runtime_config = AgentRuntimeConfig::from_config(&config)?;
    let runtime = Runtime::live(runtime_config)?;
    info!("Starting with {}", runtime.provider_info());
    let counts = runtime.agents().counts();
    info!(
        "Agents: {} built-in, {} user-defined",
        counts.built_in, counts.user_defined
    );

    let mut agent = runtime.main_agent();
    let result = match args.prompt {
        Some(prompt) => run_request(&runtime, &mut agent, &prompt).await.map(|response| {
            println!("{}", response);
            print_usage(&runtime, &agent);
        }),
        None => repl(&runtime, &mut agent).await,
    };

    runtime.processes().kill_all().await;
    result
}
