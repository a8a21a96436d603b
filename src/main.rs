use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use isrcsync::cd::backend::{describe_backends, find_available};
use isrcsync::cd::{Backend, CdDrive, CdInfoReader, DiscReader, IsrcToolReader};
use isrcsync::config::Config;
use isrcsync::credentials;
use isrcsync::musicbrainz::MusicBrainzClient;
use isrcsync::operator::TerminalOperator;
use isrcsync::reconcile_service::{self, RunOptions, RunOutcome};
use std::io::BufRead;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Submit ISRCs read from an audio CD to MusicBrainz
#[derive(Parser, Debug)]
#[command(name = "isrcsync", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// CD device (platform default when omitted)
    #[arg(env = "ISRCSYNC_DEVICE")]
    device: Option<String>,

    /// Tool used to read ISRCs
    #[arg(short, long, env = "ISRCSYNC_BACKEND")]
    backend: Option<Backend>,

    /// MusicBrainz server
    #[arg(long, env = "ISRCSYNC_SERVER")]
    server: Option<String>,

    /// Program that opens the DiscID attach page
    #[arg(long, env = "ISRCSYNC_BROWSER")]
    browser: Option<String>,

    /// Release MBID to use when the disc is unknown to MusicBrainz
    #[arg(long, value_name = "MBID")]
    release: Option<String>,

    /// Show what would be submitted without submitting
    #[arg(long)]
    dry_run: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage the MusicBrainz API token in the system keychain
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
    /// Print the disc's DiscID and attach URL
    Discid,
}

#[derive(Subcommand, Debug)]
enum TokenAction {
    /// Store a token (read from stdin when omitted)
    Set { token: Option<String> },
    /// Remove the stored token
    Clear,
}

fn apply_flags(mut config: Config, cli: &Cli) -> Config {
    if let Some(device) = &cli.device {
        config.device = Some(device.clone());
    }
    if let Some(backend) = cli.backend {
        config.backend = Some(backend);
    }
    if let Some(server) = &cli.server {
        config.server = server.clone();
    }
    if let Some(browser) = &cli.browser {
        config.browser = Some(browser.clone());
    }
    config
}

/// Pick the disc reader for the configured device and backend
fn build_reader(config: &Config) -> anyhow::Result<Box<dyn DiscReader>> {
    let device = config
        .device
        .clone()
        .unwrap_or_else(|| CdDrive::default_device().device());
    info!("Using device {}", device);

    let backend = config.backend.or_else(find_available);

    #[cfg(feature = "libdiscid")]
    {
        use isrcsync::cd::LibdiscidReader;
        let toc_reader = LibdiscidReader::new(device.clone());
        let reader: Box<dyn DiscReader> = match backend {
            Some(backend) => Box::new(IsrcToolReader::new(toc_reader, backend, device)),
            None => Box::new(toc_reader),
        };
        return Ok(reader);
    }

    #[cfg(not(feature = "libdiscid"))]
    {
        let backend = backend.ok_or_else(|| {
            anyhow!(
                "No ISRC backend found, install one of: {}",
                describe_backends()
            )
        })?;
        let toc_reader = CdInfoReader::new(device.clone());
        let reader: Box<dyn DiscReader> = match backend {
            Backend::CdInfo => Box::new(toc_reader),
            other => Box::new(IsrcToolReader::new(toc_reader, other, device)),
        };
        Ok(reader)
    }
}

fn open_browser(browser: &str, url: &str) {
    match std::process::Command::new(browser).arg(url).spawn() {
        Ok(_) => info!("Opened {} in {}", url, browser),
        Err(e) => warn!("Could not start {}: {}", browser, e),
    }
}

fn token_command(config: &Config, action: &TokenAction) -> anyhow::Result<()> {
    match action {
        TokenAction::Set { token } => {
            let token = match token {
                Some(token) => token.clone(),
                None => {
                    println!("Paste the API token for {}:", config.server);
                    let mut line = String::new();
                    std::io::stdin()
                        .lock()
                        .read_line(&mut line)
                        .context("Failed to read token")?;
                    line
                }
            };
            credentials::store_token(&config.server, &token)?;
            println!("Token stored for {}", config.server);
        }
        TokenAction::Clear => {
            credentials::remove_token(&config.server)?;
            println!("Token removed for {}", config.server);
        }
    }
    Ok(())
}

fn report(outcome: &RunOutcome, config: &Config) {
    match outcome {
        RunOutcome::Submitted {
            disc_id,
            attach_url,
            submitted,
            pending,
        } => {
            if let Some(url) = attach_url {
                println!("DiscID {} is not attached yet. Attach it at:\n{}", disc_id, url);
                if let Some(browser) = &config.browser {
                    open_browser(browser, url);
                }
            }
            println!("Submitted {} ISRC(s)", submitted);
            if *pending > 0 {
                println!(
                    "{} ISRC(s) can be submitted once the DiscID is attached; run again then",
                    pending
                );
            }
        }
        RunOutcome::NothingToSubmit => println!("Nothing to submit"),
        RunOutcome::Cancelled => println!("Cancelled"),
        RunOutcome::Declined => println!("Nothing was submitted"),
        RunOutcome::DryRun(payload) => {
            if let Some(request) = &payload.disc_id {
                println!(
                    "Would attach DiscID {}: {}",
                    request.disc_id,
                    request.toc.submission_url(&config.server)
                );
            }
            for submission in &payload.isrcs {
                println!(
                    "Would submit {} for track {}{}",
                    submission.isrc,
                    submission.track,
                    submission
                        .recording_id
                        .as_ref()
                        .map(|id| format!(" (recording {})", id))
                        .unwrap_or_default()
                );
            }
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Use RUST_LOG if set, otherwise info. Logs go to stderr, prompts to stdout.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load();
    let cli = Cli::parse();
    let config = apply_flags(config, &cli);

    match &cli.command {
        Some(Command::Token { action }) => return token_command(&config, action),
        Some(Command::Discid) => {
            let mut reader = build_reader(&config)?;
            let toc = reconcile_service::read_toc(reader.as_mut())?;
            println!("DiscID: {}", toc.identifier());
            println!("{}", toc.submission_url(&config.server));
            return Ok(());
        }
        None => {}
    }

    let mut reader = build_reader(&config)?;
    let catalog = MusicBrainzClient::new(&config.server, config.token())?;
    let mut operator = TerminalOperator::stdio(config.server.clone());
    let options = RunOptions {
        release_id: cli.release.clone(),
        dry_run: cli.dry_run,
    };

    match reconcile_service::run(reader.as_mut(), &catalog, &mut operator, &options).await {
        Ok(outcome) => {
            report(&outcome, &config);
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            std::process::exit(e.exit_code());
        }
    }
}
