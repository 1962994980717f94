//! fan-post - Publish one post to several social platforms

use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use libfanpost::client::{AggregatorClient, PostingApi};
use libfanpost::logging::LoggingConfig;
use libfanpost::service::validation::{validate_for, ValidationReport};
use libfanpost::service::FanpostService;
use libfanpost::{
    Config, FanpostError, MediaReference, Platform, PlatformOptions, PostRequest, PublishOutcome,
    PublishReport,
};
use tracing::debug;

const EXIT_SUCCESS: i32 = 0;
const EXIT_FAILURE: i32 = 1;
const EXIT_AUTH: i32 = 2;
const EXIT_INVALID_INPUT: i32 = 3;

#[derive(Parser, Debug)]
#[command(name = "fan-post")]
#[command(version, about = "Publish a post to several social platforms through a posting aggregator")]
#[command(long_about = r#"Publish a post to several social platforms through a posting aggregator.

Each platform is validated, has its local media exposed through a tunnel,
and is posted independently. One platform failing does not stop the others.

EXAMPLES:
    # Post to the default platforms from the config file
    fan-post "Shipping a new release today"

    # Pick platforms and attach media
    fan-post "Sunset" -p instagram,facebook -m static/uploads/sunset.jpg

    # Platform options
    fan-post "Weekly thread" -p reddit -o reddit.subreddit=rust -o reddit.flair=discussion

    # Check a post without sending it
    echo "Hello" | fan-post -p x,instagram --validate-only --format json

EXIT CODES:
    0 - Every platform succeeded (or validated)
    1 - At least one platform failed
    2 - Authentication with the aggregator failed
    3 - Invalid input (unknown platform, empty content, failed validation)
"#)]
struct Cli {
    /// Content to post (reads from stdin if not provided)
    content: Option<String>,

    /// Target platform(s), comma-separated
    #[arg(short, long, value_name = "PLATFORMS")]
    platform: Option<String>,

    /// Media file path or URL (repeatable)
    #[arg(short, long = "media", value_name = "PATH_OR_URL")]
    media: Vec<String>,

    /// Platform option as platform.key=value (repeatable)
    #[arg(short, long = "option", value_name = "PLATFORM.KEY=VALUE")]
    option: Vec<String>,

    /// Validate against platform rules without posting
    #[arg(long)]
    validate_only: bool,

    /// List accounts connected to the aggregator
    #[arg(long, conflicts_with = "validate_only")]
    list_accounts: bool,

    /// Deadline for the whole publish, e.g. 30s or 2m
    #[arg(long, value_parser = humantime::parse_duration, value_name = "DURATION")]
    timeout: Option<Duration>,

    /// Output format
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file
    #[arg(short, long, env = "FANPOST_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(if e.use_stderr() { EXIT_INVALID_INPUT } else { EXIT_SUCCESS });
        }
    };

    LoggingConfig::from_env().with_verbose(cli.verbose).init();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(exit_code_for(&e));
        }
    }
}

fn exit_code_for(error: &anyhow::Error) -> i32 {
    error
        .downcast_ref::<FanpostError>()
        .map(FanpostError::exit_code)
        .unwrap_or(EXIT_FAILURE)
}

async fn run(cli: Cli) -> Result<i32> {
    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_or_default()?,
    };

    if cli.list_accounts {
        return list_accounts(&config, &cli.format).await;
    }

    let content = read_content(cli.content.as_deref())?;
    let platforms = match &cli.platform {
        Some(list) => Platform::parse_list(list)?,
        None => config.default_platforms(),
    };
    if platforms.is_empty() {
        return Err(FanpostError::InvalidInput("No platforms selected".to_string()).into());
    }

    let mut options = PlatformOptions::new();
    for assignment in &cli.option {
        options.parse_assignment(assignment)?;
    }

    let mut request = PostRequest::for_platforms(content, platforms).with_options(options);
    for media in &cli.media {
        request = request.with_media(MediaReference::parse(media));
    }

    debug!(
        request_id = %request.id,
        platforms = ?request.platforms,
        media_count = request.media.len(),
        validate_only = cli.validate_only,
        "Built post request"
    );

    if cli.validate_only {
        let reports: Vec<ValidationReport> = request
            .platforms
            .iter()
            .map(|p| validate_for(*p, &request.content, &request.media, &request.options))
            .collect();
        print_validation(&reports, &cli.format)?;
        let code = if reports.iter().all(|r| r.valid) {
            EXIT_SUCCESS
        } else {
            EXIT_INVALID_INPUT
        };
        return Ok(code);
    }

    let service = FanpostService::from_config(config)?;
    let report = match cli.timeout {
        Some(timeout) => service.dispatcher().publish_with_timeout(&request, timeout).await,
        None => service.dispatcher().publish(&request).await,
    };

    print_report(&report, &cli.format)?;
    Ok(report_exit_code(&report))
}

/// Content from the argument, or from stdin when it is not a terminal
fn read_content(arg: Option<&str>) -> Result<String> {
    let content = match arg {
        Some(content) => content.to_string(),
        None if !std::io::stdin().is_terminal() => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read content from stdin")?;
            buffer
        }
        None => String::new(),
    };

    let content = content.trim().to_string();
    if content.is_empty() {
        return Err(FanpostError::InvalidInput(
            "Content cannot be empty. Provide it as an argument or on stdin".to_string(),
        )
        .into());
    }
    Ok(content)
}

fn report_exit_code(report: &PublishReport) -> i32 {
    if report.all_succeeded() {
        return EXIT_SUCCESS;
    }
    let auth_failed = report.results.values().any(|r| {
        matches!(
            &r.outcome,
            PublishOutcome::Failed(libfanpost::error::DispatchFailure::Upstream(e)) if e.is_auth_failure()
        )
    });
    if auth_failed && !report.any_succeeded() {
        EXIT_AUTH
    } else {
        EXIT_FAILURE
    }
}

fn print_report(report: &PublishReport, format: &str) -> Result<()> {
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report.results)?);
        return Ok(());
    }
    for (platform, result) in &report.results {
        match &result.outcome {
            PublishOutcome::Succeeded { post_id, .. } => {
                println!("{}: ok {}", platform, post_id.as_deref().unwrap_or("-"));
            }
            PublishOutcome::Failed(failure) => println!("{}: failed: {}", platform, failure),
        }
    }
    Ok(())
}

fn print_validation(reports: &[ValidationReport], format: &str) -> Result<()> {
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(reports)?);
        return Ok(());
    }
    for report in reports {
        if report.valid {
            println!("{}: valid", report.platform);
        } else {
            println!("{}: invalid: {}", report.platform, report.messages().join("; "));
        }
        for warning in &report.warnings {
            println!("{}: warning: {}", report.platform, warning);
        }
    }
    Ok(())
}

async fn list_accounts(config: &Config, format: &str) -> Result<i32> {
    let client = AggregatorClient::from_config(config)?;
    let accounts = client
        .list_accounts()
        .await
        .map_err(FanpostError::Upstream)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&accounts)?);
    } else if accounts.is_empty() {
        println!("No connected accounts");
    } else {
        for account in &accounts {
            let name = account
                .username
                .as_deref()
                .or(account.name.as_deref())
                .unwrap_or("-");
            let state = if account.connected { "connected" } else { "disconnected" };
            println!("{}\t{}\t{}\t{}", account.platform, account.id, name, state);
        }
    }
    Ok(EXIT_SUCCESS)
}
