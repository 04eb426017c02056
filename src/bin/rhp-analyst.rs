//! CLI binary for rhp-analyst.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `AnalyzerConfig`, runs one analysis (or the HTTP server) and prints
//! results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rhp_analyst::server::{self, ServerConfig};
use rhp_analyst::{
    analyze_path, extract_only, AnalysisError, AnalysisInputs, AnalysisOutput,
    AnalysisProgressCallback, AnalyzerConfig, ErrorCategory, ProgressCallback, Stage, Verdict,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal spinner that names the running stage and logs each completed one.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Analysing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Extract => "Extracting text",
        Stage::Prompt => "Building prompt",
        Stage::Llm => "Waiting for the model",
        Stage::Validate => "Validating response",
        Stage::Rules => "Applying rules",
        Stage::Assemble => "Assembling result",
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_message(format!("{}…", stage_label(stage)));
    }

    fn on_stage_complete(&self, stage: Stage, elapsed: Duration) {
        self.bar.println(format!(
            "  {} {:<24} {}",
            green("✓"),
            stage_label(stage),
            dim(&format!("{:.1}s", elapsed.as_secs_f64())),
        ));
    }

    fn on_retry(&self, attempt: u32, max_attempts: u32, delay: Duration, error: &str) {
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} attempt {}/{} failed: {}  {}",
            yellow("↻"),
            attempt,
            max_attempts,
            red(&msg),
            dim(&format!("retrying in {:.0}s", delay.as_secs_f64())),
        ));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyse a prospectus with the default provider (Gemini)
  rhp-analyst analyze rhp.pdf

  # Supply market data for the rule layer
  rhp-analyst analyze rhp.pdf --issue-price 420 --gmp 35 --sub-retail 3.1 --sub-nii 7.4 --sub-qib 0.4

  # Use Groq and emit JSON with per-request stats
  rhp-analyst --provider groq analyze rhp.pdf --json --stats > analysis.json

  # Analyse a prospectus straight from a URL
  rhp-analyst analyze https://example.com/offer-documents/rhp.pdf

  # Check what text pdfium gets out of a file (no API key needed)
  rhp-analyst extract rhp.pdf --dump | less

  # Run the HTTP API on port 8000
  rhp-analyst serve --bind 0.0.0.0:8000

PROVIDERS:
  Provider  Default model          Credential
  ────────  ─────────────────────  ──────────────
  gemini    gemini-2.0-flash       GEMINI_API_KEY
  groq      groq/compound-mini     GROQ_API_KEY
  openai    gpt-4o-mini            OPENAI_API_KEY

ENVIRONMENT VARIABLES:
  LLM_PROVIDER              Active provider (gemini, groq, openai)
  GEMINI_MODEL / GROQ_MODEL / OPENAI_MODEL   Per-provider model override
  RHP_REQUEST_TIMEOUT_SECS  Per-request LLM timeout (default 30)
  RHP_MAX_ATTEMPTS          LLM attempts per analysis (default 3)
  RHP_RETRY_DELAY_MS        Linear backoff unit (default 2000)
  PDFIUM_LIB_PATH           libpdfium file or directory (default: system library)
  RHP_BIND_ADDR             Server bind address (default 0.0.0.0:8000)
  BACKEND_CORS_ORIGINS      Comma-separated or JSON list of allowed origins
  APP_NAME                  Name reported by the server
  RUST_LOG                  Log filter, overrides -v / -q

EXIT CODES:
  0  success
  1  internal error (PDF engine, configuration, bug)
  2  bad input (missing file, not a PDF, empty document)
  3  LLM provider failure
"#;

/// Analyse IPO prospectuses with an LLM and deterministic sanity rules.
#[derive(Parser, Debug)]
#[command(
    name = "rhp-analyst",
    version,
    about = "Analyse IPO prospectuses (RHP PDFs) with an LLM and deterministic sanity rules",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// LLM provider: gemini, groq, openai.
    #[arg(long, global = true, env = "LLM_PROVIDER")]
    provider: Option<String>,

    /// Model ID for the selected provider.
    #[arg(long, global = true)]
    model: Option<String>,

    /// Total LLM attempts per analysis.
    #[arg(long, global = true, env = "RHP_MAX_ATTEMPTS")]
    max_attempts: Option<u32>,

    /// Per-request LLM timeout in seconds.
    #[arg(long, global = true, env = "RHP_REQUEST_TIMEOUT_SECS")]
    timeout: Option<u64>,

    /// Path to libpdfium (file or directory).
    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "RHP_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "RHP_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyse a prospectus and print the verdict.
    Analyze(AnalyzeArgs),
    /// Extract text only; no LLM call.
    Extract(ExtractArgs),
    /// Run the HTTP API.
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Issue price per share.
    #[arg(long, default_value_t = 100.0)]
    issue_price: f64,

    /// Grey market premium.
    #[arg(long, default_value_t = 0.0)]
    gmp: f64,

    /// Retail subscription (×).
    #[arg(long, default_value_t = 0.0)]
    sub_retail: f64,

    /// Non-institutional subscription (×).
    #[arg(long, default_value_t = 0.0)]
    sub_nii: f64,

    /// Qualified-institutional subscription (×).
    #[arg(long, default_value_t = 0.0)]
    sub_qib: f64,

    /// Output the analysis as JSON instead of a summary.
    #[arg(long)]
    json: bool,

    /// Include per-request stats (with --json: wrap as {result, stats}).
    #[arg(long)]
    stats: bool,

    /// Write the JSON analysis to this file.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Disable the progress spinner.
    #[arg(long, env = "RHP_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Print the extracted text to stdout.
    #[arg(long)]
    dump: bool,
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "RHP_BIND_ADDR")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner provides all the feedback that matters during an
    // interactive analysis, so INFO logs are hidden while it runs.
    let spinner = matches!(&cli.command, Command::Analyze(a) if !a.no_progress && !a.json)
        && !cli.quiet;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || spinner {
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

    match run(cli, spinner).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", red("error:"), e);
            ExitCode::from(exit_code(&e))
        }
    }
}

/// Map the root cause to a process exit code.
fn exit_code(e: &anyhow::Error) -> u8 {
    match e.downcast_ref::<AnalysisError>().map(AnalysisError::category) {
        Some(ErrorCategory::BadInput) => 2,
        Some(ErrorCategory::Upstream) => 3,
        Some(ErrorCategory::Internal) | None => 1,
    }
}

async fn run(cli: Cli, spinner: bool) -> Result<()> {
    let progress = spinner.then(CliProgressCallback::new);
    let config = build_config(
        &cli,
        progress.clone().map(|p| p as ProgressCallback),
    )?;

    match cli.command {
        Command::Analyze(ref args) => {
            let inputs = AnalysisInputs::default()
                .with_issue_price(args.issue_price)
                .with_gmp(args.gmp)
                .with_subscription(args.sub_retail, args.sub_nii, args.sub_qib);

            let result = analyze_path(&args.input, inputs, &config).await;
            if let Some(ref p) = progress {
                p.finish();
            }
            let output = result.context("Analysis failed")?;
            print_analysis(&output, args, cli.quiet)
        }
        Command::Extract(ref args) => {
            let doc = rhp_analyst::pipeline::input::load_input(&args.input, config.download_timeout_secs)
                .await
                .context("Failed to load PDF")?;
            let extracted = extract_only(doc.bytes, &config)
                .await
                .context("Extraction failed")?;

            if args.dump {
                let stdout = io::stdout();
                let mut handle = stdout.lock();
                handle
                    .write_all(extracted.text.as_bytes())
                    .context("Failed to write to stdout")?;
            }
            if !cli.quiet {
                eprintln!(
                    "{}  {}/{} pages  {} chars{}",
                    if extracted.is_blank() { red("✘") } else { green("✔") },
                    extracted.pages_read,
                    extracted.total_pages,
                    extracted.text.chars().count(),
                    if extracted.is_blank() {
                        red("  (no text — scanned document?)")
                    } else {
                        String::new()
                    },
                );
            }
            Ok(())
        }
        Command::Serve(ref args) => {
            let mut server_config = ServerConfig::from_env().context("Invalid server configuration")?;
            if let Some(ref bind) = args.bind {
                server_config.bind = bind
                    .parse()
                    .with_context(|| format!("Invalid bind address '{}'", bind))?;
            }
            server::serve(config, server_config)
                .await
                .context("Server failed")
        }
    }
}

/// Environment first, flags on top.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<AnalyzerConfig> {
    let mut config = AnalyzerConfig::from_env().context("Invalid configuration")?;

    if let Some(ref provider) = cli.provider {
        config.provider_name = provider.clone();
    }
    if let Some(ref model) = cli.model {
        config.model = Some(model.clone());
    }
    if let Some(n) = cli.max_attempts {
        if n == 0 {
            anyhow::bail!("--max-attempts must be ≥ 1");
        }
        config.max_attempts = n;
    }
    if let Some(secs) = cli.timeout {
        if secs == 0 {
            anyhow::bail!("--timeout must be ≥ 1 second");
        }
        config.request_timeout_secs = secs;
    }
    if let Some(ref path) = cli.pdfium {
        config.pdfium_library = Some(path.clone());
    }
    config.progress_callback = progress;

    Ok(config)
}

fn print_analysis(output: &AnalysisOutput, args: &AnalyzeArgs, quiet: bool) -> Result<()> {
    let json = if args.stats {
        serde_json::to_string_pretty(output)
    } else {
        serde_json::to_string_pretty(&output.result)
    }
    .context("Failed to serialise analysis")?;

    if let Some(ref path) = args.output {
        std::fs::write(path, format!("{json}\n"))
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    if args.json {
        println!("{json}");
        return Ok(());
    }

    let r = &output.result;
    let verdict = match r.final_verdict {
        Verdict::Apply => green(r.final_verdict.as_str()),
        Verdict::HighRiskApply => yellow(r.final_verdict.as_str()),
        Verdict::Avoid => red(r.final_verdict.as_str()),
    };

    println!("{} {}", cyan("◆"), bold(&first_line(&r.company_overview)));
    println!();
    println!("Verdict:    {}", bold(&verdict));
    println!(
        "Scores:     financial {}  valuation {}  promoter {}  demand {}",
        r.scores.financial_strength,
        r.scores.valuation_comfort,
        r.scores.promoter_quality,
        r.scores.demand_strength,
    );
    println!();
    println!("{}", bold("Strengths"));
    for s in &r.key_strengths {
        println!("  {} {}", green("+"), s);
    }
    println!("{}", bold("Risks"));
    for s in &r.key_risks {
        println!("  {} {}", red("-"), s);
    }
    println!();
    println!("{}", r.final_comment);

    if !quiet {
        let s = &output.stats;
        if !s.adjustments.is_empty() {
            eprintln!();
            for adj in &s.adjustments {
                eprintln!("  {} {}", yellow("⚖"), adj);
            }
        }
        if args.stats {
            eprintln!();
            eprintln!(
                "   {} via {}  ·  {} pages  ·  {} chars  ·  {} attempt(s)  ·  {}ms",
                dim(&s.model),
                dim(&s.provider),
                s.pages_read,
                s.text_chars,
                s.llm_attempts,
                s.total_duration_ms,
            );
            eprintln!("   request {}", dim(&s.request_id));
        }
    }
    Ok(())
}

fn first_line(s: &str) -> String {
    s.lines().next().unwrap_or("").trim().to_string()
}
