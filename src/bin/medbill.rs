//! CLI binary for medbill-extract.
//!
//! A thin shim over the library crate: maps CLI flags to `ExtractorConfig`,
//! then either runs one extraction and prints the JSON response, or serves
//! the HTTP endpoint.

use anyhow::{Context, Result};
use clap::Parser;
use medbill_extract::{server, BillExtractor, ExtractorConfig};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract one bill and print the JSON response
  medbill https://example.com/bills/patient-123.pdf --pretty

  # Use a different Gemini model
  medbill --model gemini-1.5-pro https://example.com/scan.jpg

  # Use another vision provider through edgequake-llm
  medbill --provider openai --model gpt-4.1-mini https://example.com/bill.png

  # Run the HTTP service
  medbill --serve --addr 0.0.0.0:8000
  curl -X POST localhost:8000/extract-bill-data \
       -H 'content-type: application/json' \
       -d '{"document": "https://example.com/bill.pdf"}'

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Gemini API key (default provider)
  OPENAI_API_KEY          OpenAI API key (with --provider openai)
  ANTHROPIC_API_KEY       Anthropic API key (with --provider anthropic)
  MEDBILL_PROVIDER        Override provider
  MEDBILL_MODEL           Override model ID
  RUST_LOG                Override log filter (e.g. medbill_extract=debug)
"#;

/// Extract line items from medical bill documents using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "medbill",
    version,
    about = "Extract line items from medical bill PDFs and images using Vision LLMs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// HTTP/HTTPS URL of the bill document (omit with --serve).
    #[arg(required_unless_present = "serve")]
    document: Option<String>,

    /// Run the HTTP service instead of a one-off extraction.
    #[arg(long)]
    serve: bool,

    /// Listen address for --serve.
    #[arg(long, env = "MEDBILL_ADDR", default_value = "0.0.0.0:8000")]
    addr: SocketAddr,

    /// Model provider: gemini (default), openai, anthropic, mistral, ollama, …
    #[arg(long, env = "MEDBILL_PROVIDER")]
    provider: Option<String>,

    /// Model ID.
    #[arg(long, env = "MEDBILL_MODEL", default_value = medbill_extract::config::DEFAULT_MODEL)]
    model: String,

    /// Gemini API key.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Gemini API base URL.
    #[arg(long, env = "MEDBILL_API_BASE_URL", default_value = medbill_extract::config::DEFAULT_GEMINI_BASE_URL)]
    api_base_url: String,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "MEDBILL_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max output tokens for the model answer.
    #[arg(long, env = "MEDBILL_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Directory for downloaded scratch files (default: OS temp dir).
    #[arg(long, env = "MEDBILL_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// Document download timeout in seconds (default: none).
    #[arg(long, env = "MEDBILL_DOWNLOAD_TIMEOUT")]
    download_timeout: Option<u64>,

    /// Model API timeout in seconds (default: none).
    #[arg(long, env = "MEDBILL_API_TIMEOUT")]
    api_timeout: Option<u64>,

    /// Pretty-print the JSON response.
    #[arg(long)]
    pretty: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MEDBILL_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the JSON response.
    #[arg(short, long, env = "MEDBILL_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;
    let extractor = Arc::new(BillExtractor::new(config).context("Failed to set up the model client")?);

    // ── Server mode ──────────────────────────────────────────────────────
    if cli.serve {
        server::serve(cli.addr, extractor)
            .await
            .with_context(|| format!("HTTP server on {} failed", cli.addr))?;
        return Ok(());
    }

    // ── One-off extraction ───────────────────────────────────────────────
    let document = cli
        .document
        .as_deref()
        .context("A document URL is required unless --serve is given")?;
    let response = extractor.extract(document).await;

    let json = if cli.pretty {
        serde_json::to_string_pretty(&response)
    } else {
        serde_json::to_string(&response)
    }
    .context("Failed to serialise response")?;

    {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(json.as_bytes())
            .and_then(|_| handle.write_all(b"\n"))
            .context("Failed to write to stdout")?;
    }

    if !cli.quiet {
        match (&response.data, &response.error_message) {
            (Some(data), _) => eprintln!(
                "{} {} items on {} pages  {}",
                green("✔"),
                data.total_item_count,
                data.pagewise_line_items.len(),
                dim(&format!(
                    "{} tokens in / {} tokens out",
                    response.token_usage.input_tokens, response.token_usage.output_tokens
                )),
            ),
            (None, Some(msg)) => eprintln!("{} {}", red("✘"), red(msg)),
            (None, None) => {}
        }
    }

    if !response.is_success {
        std::process::exit(1);
    }
    Ok(())
}

/// Map CLI args to `ExtractorConfig`.
fn build_config(cli: &Cli) -> Result<ExtractorConfig> {
    let mut builder = ExtractorConfig::builder()
        .model(&cli.model)
        .api_base_url(&cli.api_base_url)
        .temperature(cli.temperature)
        .max_output_tokens(cli.max_tokens);

    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(ref dir) = cli.scratch_dir {
        builder = builder.scratch_dir(dir);
    }
    if let Some(secs) = cli.download_timeout {
        builder = builder.download_timeout_secs(secs);
    }
    if let Some(secs) = cli.api_timeout {
        builder = builder.api_timeout_secs(secs);
    }

    builder.build().context("Invalid configuration")
}
