use anyhow::{Context, Result};
use research_orchestrator::ResearchOrchestrator;
use std::io::{IsTerminal, Read};

const USAGE: &str = "usage: research-cli <question...>  (or pipe the question on stdin)";

/// Question from the command line, falling back to stdin when no words are given
fn read_question(args: &[String]) -> Result<Option<String>> {
    let joined = args.join(" ");
    if !joined.trim().is_empty() {
        return Ok(Some(joined));
    }
    if std::io::stdin().is_terminal() {
        return Ok(None);
    }
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("failed to read question from stdin")?;
    Ok(Some(input).filter(|q| !q.trim().is_empty()))
}

fn init_tracing() {
    // Logs go to stderr so stdout stays a single JSON document
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(question) = read_question(&args)? else {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };

    let orchestrator = ResearchOrchestrator::from_env()?;
    let config = orchestrator.config();
    tracing::info!("Configuration loaded");
    tracing::info!("  Max workers: {}", config.aggregator.max_workers);
    tracing::info!("  Unit timeout: {:?}", config.aggregator.unit_timeout);
    tracing::info!("  Region: {}", config.resolver.region);

    match orchestrator.run(&question).await {
        Ok(envelope) => {
            println!("{}", serde_json::to_string_pretty(&envelope)?);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Analysis failed: {}", e);
            println!("{}", serde_json::to_string_pretty(&e.report())?);
            let code = if e.category() == "invalid_question" { 2 } else { 1 };
            std::process::exit(code);
        }
    }
}
