//! # Deep Research CLI
//!
//! Runs one research session from the terminal: progress is printed as each
//! stage finishes, followed by the final report.
//!
//! ## Quick Start
//! ```bash
//! cargo run -- "effect of caffeine on sleep"
//! ```

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use deep_research::{
    Config, DuckDuckGoSearch, LanguageModel, OllamaModel, Orchestrator, ProgressEvent,
    SearchProvider, SearchService, Stage, TavilySearch,
};

// =============================================================================
// CLI ARGUMENTS
// =============================================================================
#[derive(Parser, Debug)]
#[command(
    name = "deep-research",
    version,
    about = "Iterative web research: query, search, summarize, reflect, repeat",
    long_about = r#"
Deep Research - iterative research with a local model and web search.

Each run:
  1. Writes a search query for the topic
  2. Searches the web and summarizes the results
  3. Reflects on the summary to find a knowledge gap
  4. Repeats with a follow-up query, then writes a report with sources

PREREQUISITES:
  1. Install Ollama: https://ollama.ai
  2. Pull a reasoning model: ollama pull deepseek-r1
  3. Optional: set TAVILY_API_KEY to search with Tavily (images included)

EXAMPLES:
  deep-research "effect of caffeine on sleep"
  deep-research --loops 2 --model deepseek-r1 "Rust async runtimes"
  deep-research --json "solid-state batteries" > events.jsonl
"#
)]
struct Args {
    /// The research topic to investigate
    #[arg(value_name = "TOPIC")]
    topic: String,

    /// The Ollama model to use (overrides OLLAMA_MODEL env var)
    #[arg(short = 'm', long = "model", env = "OLLAMA_MODEL")]
    model: Option<String>,

    /// Number of web-research passes (overrides MAX_RESEARCH_LOOPS)
    #[arg(short = 'l', long = "loops")]
    loops: Option<usize>,

    /// Search backend: tavily or duckduckgo (overrides SEARCH_PROVIDER)
    #[arg(short = 's', long = "search")]
    search: Option<SearchProvider>,

    /// Stream model output and print its reasoning live
    #[arg(long = "stream", default_value = "false")]
    stream: bool,

    /// Print every progress event as a JSON line instead of text
    #[arg(long = "json", default_value = "false")]
    json: bool,

    /// Enable verbose/debug logging
    #[arg(short = 'v', long = "verbose", default_value = "false")]
    verbose: bool,
}

// =============================================================================
// MAIN FUNCTION
// =============================================================================
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose)?;

    let mut config = Config::from_env()?;
    apply_overrides(&mut config, &args);
    config.validate()?;

    info!(
        model = %config.model,
        host = %config.ollama_host,
        search = ?config.search_provider,
        loops = config.research.max_loops,
        "Configuration loaded"
    );

    // # Rust Concept: Trait Objects behind Arc
    // `Arc<dyn LanguageModel>` erases the concrete provider type, so the
    // orchestrator never needs to know whether it talks to Ollama or a test
    // double. `Arc` lets the spawned run task share it without copying.
    let model: Arc<dyn LanguageModel> = Arc::new(OllamaModel::new(
        &config.ollama_host,
        config.model.clone(),
        config.temperature,
    ));
    let search: Arc<dyn SearchService> = match config.search_provider {
        SearchProvider::Tavily => {
            let key = config
                .tavily_api_key
                .clone()
                .context("TAVILY_API_KEY is required for Tavily search")?;
            Arc::new(TavilySearch::new(key))
        }
        SearchProvider::DuckDuckGo => Arc::new(DuckDuckGoSearch::new()),
    };

    let orchestrator = Orchestrator::new(model, search, config.research.clone());
    let run_id = uuid::Uuid::new_v4().to_string();
    let mut run = orchestrator.start(args.topic.clone(), run_id);

    while let Some(event) = run.events.recv().await {
        if args.json {
            println!("{}", serde_json::to_string(&event)?);
        } else {
            print_event(&event);
        }
    }

    match run.outcome.await.context("Research task panicked")? {
        Ok(state) => {
            info!(loop_count = state.loop_count, "Research completed successfully");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Research failed");
            eprintln!("\nResearch failed: {}", e);
            if e.to_string().contains("Ollama") {
                eprintln!("\nTip: Make sure Ollama is running and the model is pulled:");
                eprintln!("   ollama serve");
                eprintln!("   ollama pull {}", config.model);
            }
            Err(e.into())
        }
    }
}

/// Layer command-line flags over the environment configuration.
///
/// # Rust Concept: Mutable Borrows
///
/// `&mut Config` hands this function exclusive, temporary write access.
/// No other code can read `config` until the borrow ends, which is why the
/// caller can validate it right afterwards without any locking.
fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    if let Some(loops) = args.loops {
        config.research.max_loops = loops;
    }
    if let Some(search) = args.search {
        config.search_provider = search;
    }
    if args.stream {
        config.research.streaming = true;
    }
}

/// Human-readable rendering of one progress event.
fn print_event(event: &ProgressEvent) {
    let rule = "=".repeat(60);
    match event.stage {
        Stage::GenerateQuery => {
            println!("\n[query] {}", event.text("query"));
            println!("        why: {}", event.text("rationale"));
        }
        Stage::WebResearch => {
            let count = event.payload["sources"].as_array().map_or(0, Vec::len);
            println!("[search] {} source(s), pass {}", count, event.payload["loop_count"]);
        }
        Stage::Summarize => println!("[summary] {} chars", event.text("summary").len()),
        Stage::Reflection => {
            println!("[gap] {}", event.text("knowledge_gap"));
            println!("[next] {}", event.text("query"));
        }
        Stage::Routing => println!(
            "[route] {} (loop {})",
            event.text("decision"),
            event.payload["loop_count"]
        ),
        Stage::Finalize => {
            println!("\n{}\nRESEARCH REPORT\n{}\n", rule, rule);
            println!("{}", event.text("summary"));
            println!("{}", rule);
        }
        Stage::Thinking => {
            print!("{}", event.text("chunk"));
            let _ = io::stdout().flush();
        }
        Stage::RunComplete => println!("[done]"),
        Stage::Error => eprintln!("[error] {}: {}", event.text("stage"), event.text("cause")),
    }
}

// =============================================================================
// LOGGING INITIALIZATION
// =============================================================================
fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}
