//! Terminal chat client for the BrightSphere study companion.

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use brightsphere_ai::{Companion, DeltaCoalescer, DeltaSink, ProviderSettings};

const DEFAULT_SYSTEM_PROMPT: &str = "You are BrightSphere, a friendly study companion for \
Zambian primary and secondary school learners. Explain concepts step by step in clear, \
simple English and encourage the learner to keep trying.";

#[derive(Parser, Debug)]
#[command(name = "brightsphere", about = "Chat with the BrightSphere study companion")]
struct Cli {
    /// System prompt establishing the companion's persona
    #[arg(long, default_value = DEFAULT_SYSTEM_PROMPT)]
    system_prompt: String,

    /// Abort a reply when no data arrives for this many seconds
    #[arg(long, default_value_t = 120)]
    idle_timeout: u64,

    /// Print each delta as it arrives instead of batching updates
    #[arg(long)]
    no_coalescing: bool,
}

/// Sink that prints deltas to stdout as they arrive.
struct StdoutSink;

#[async_trait]
impl DeltaSink for StdoutSink {
    async fn on_delta(&mut self, text: &str) {
        print!("{text}");
        let _ = io::stdout().flush();
    }

    async fn on_complete(&mut self) {
        println!();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = ProviderSettings::from_env()
        .with_idle_timeout(Duration::from_secs(cli.idle_timeout));
    let chain = settings.build_chain();

    let mut companion =
        Companion::new(Arc::new(chain)).with_system_prompt(cli.system_prompt);
    if !cli.no_coalescing {
        companion = companion.with_coalescing(DeltaCoalescer::default());
    }

    println!("{}", "BrightSphere study companion. Empty line quits.".dimmed());

    let stdin = io::stdin();
    let mut sink = StdoutSink;
    loop {
        print!("{} ", "you:".green().bold());
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            break;
        }

        print!("{} ", "companion:".cyan().bold());
        io::stdout().flush()?;
        if let Err(e) = companion.send(question, &mut sink).await {
            eprintln!("{} {e}", "connection error:".red());
        }
    }

    Ok(())
}
