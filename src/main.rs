use anyhow::{Context, Result};
use clap::Parser;
use kunth::config::{self, Config, Overrides};
use kunth::git_ops::GitCli;
use kunth::publish::Publisher;
use kunth::report::format_report;
use kunth::standards::load_standards;
use kunth::suggest::llm::{Applier, Assessor, CompletionBackend, HttpBackend, Provider};
use kunth::suggest::SelectionPolicy;
use kunth::telemetry;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(
    name = "kunth",
    about = "Check a file against coding standards and push the top fix to a branch",
    version
)]
struct Args {
    /// Config file (defaults to <config dir>/kunth/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// File to assess, absolute or relative to the repository
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Repository containing the file
    #[arg(short, long)]
    repo: Option<PathBuf>,

    /// Apply suggestions with priority at or below this value
    #[arg(short, long)]
    threshold: Option<u32>,

    /// Directory of standards documents
    #[arg(short, long)]
    standards: Option<PathBuf>,

    /// Model provider: anthropic or openrouter
    #[arg(long, value_parser = parse_provider)]
    provider: Option<Provider>,

    /// Model id to use instead of the provider default
    #[arg(long)]
    model: Option<String>,

    /// Which eligible suggestions to apply: lowest-only or all-eligible
    #[arg(long, value_parser = parse_selection)]
    selection: Option<SelectionPolicy>,

    /// Print the report and stop before publishing
    #[arg(long)]
    assess_only: bool,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,

    /// Store an API key in the system keychain and exit
    #[arg(long)]
    setup: bool,
}

fn parse_provider(value: &str) -> Result<Provider, String> {
    match value {
        "anthropic" => Ok(Provider::Anthropic),
        "openrouter" => Ok(Provider::OpenRouter),
        other => Err(format!(
            "unknown provider '{}' (expected anthropic or openrouter)",
            other
        )),
    }
}

fn parse_selection(value: &str) -> Result<SelectionPolicy, String> {
    match value {
        "lowest-only" => Ok(SelectionPolicy::LowestOnly),
        "all-eligible" => Ok(SelectionPolicy::AllEligible),
        other => Err(format!(
            "unknown selection '{}' (expected lowest-only or all-eligible)",
            other
        )),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    telemetry::init(args.verbose);

    if args.setup {
        return config::setup_api_key_interactive(args.provider.unwrap_or_default());
    }

    let overrides = Overrides {
        target_file: args.file,
        repository_path: args.repo,
        priority_threshold: args.threshold,
        standards_directory: args.standards,
        provider: args.provider,
        model: args.model,
        selection: args.selection,
    };
    let config = Config::load(args.config.as_deref(), overrides)?;
    debug!(?config, "configuration loaded");

    let provider = config.model.provider;
    let api_key = config::api_key(provider).with_context(|| {
        format!(
            "No API key found. Set {} or run `kunth --setup`.",
            provider.api_key_env()
        )
    })?;
    let http = HttpBackend::new(config.model.clone(), api_key);
    info!(
        provider = http.settings().provider.label(),
        model = %http.settings().model,
        "using model"
    );
    let backend: Arc<dyn CompletionBackend> = Arc::new(http);

    let code = fs::read_to_string(&config.target_file)
        .with_context(|| format!("Failed to read '{}'", config.target_file.display()))?;
    let standards = load_standards(&config.standards_directory, &config.standards_extension)?;

    let assessor = Assessor::new(Arc::clone(&backend));
    let mut suggestions = Vec::new();
    for standard in &standards {
        info!("assessing against {}", standard.name);
        let found = assessor
            .assess(&code, &standard.text)
            .await
            .with_context(|| format!("Assessment against '{}' failed", standard.name))?;
        print!("{}", format_report(&standard.name, &found));
        suggestions.extend(found);
    }

    if args.assess_only {
        return Ok(());
    }

    let publisher = Publisher::new(
        Applier::new(backend),
        Arc::new(GitCli::new(config.git_timeout)),
        config.repository_path.clone(),
        config.publish.clone(),
    );
    let outcome = publisher
        .publish(&config.target_file, &suggestions, config.priority_threshold)
        .await?;
    println!("{}", outcome.notice());

    Ok(())
}
