//! Command-line front end for the P2P permission state
//!
//! # Usage
//!
//! ```bash
//! # Show the reconciled state
//! p2p-permission status
//!
//! # Ask for the permission, explaining why if the user declined before
//! p2p-permission request --explain
//!
//! # Simulate an OS grant made outside the app
//! P2P_PERMISSION_GRANTED=true p2p-permission status
//! ```

mod terminal;
mod tracing_support;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

use p2p_permission::permission::{
    FilePreferenceStore, NotificationAction, P2pPermissionManager, PermissionMessages,
    PermissionOracle, PermissionPresets, PermissionRequest, PermissionState, PresentationContext,
    StaticOracle,
};
use terminal::{TerminalAdvisoryPresenter, TerminalNotificationPresenter, TerminalPrompt};
use tracing_support::{init_subscriber_with_config, TracingConfig, TracingFormat};

const APP_NAME: &str = "p2p-permission";

#[derive(Parser, Debug)]
#[command(
    name = "p2p-permission",
    version,
    about = "Inspect and drive the Wi-Fi Direct permission state"
)]
struct Cli {
    /// Preference file (defaults to the per-user config directory)
    #[arg(long, global = true, env = "P2P_PERMISSION_STORE")]
    store: Option<PathBuf>,

    /// Whether the OS currently grants the nearby devices permission
    #[arg(
        long,
        global = true,
        env = "P2P_PERMISSION_GRANTED",
        default_value_t = false,
        action = clap::ArgAction::Set
    )]
    granted: bool,

    /// JSON file overriding dialog and notification text
    #[arg(long, global = true)]
    messages: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "compact")]
    log_format: TracingFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the reconciled state and persisted flags
    Status,

    /// Overwrite the persisted state
    Set {
        #[arg(value_parser = parse_state)]
        state: PermissionState,
    },

    /// Clear a session-only opt-out so the next request prompts again
    Reset,

    /// Report that the user finished a permission prompt or settings visit
    Apply {
        /// Opt out permanently if the permission is still not granted
        #[arg(long)]
        permanent: bool,
    },

    /// Run the consent flow and wait for the outcome
    Request {
        /// Explain with a rationale dialog when the user declined before
        #[arg(long)]
        explain: bool,

        /// Use a notification instead of prompting
        #[arg(long)]
        background: bool,

        /// Simulate the OS reporting that a rationale is warranted
        #[arg(long)]
        os_rationale: bool,

        /// Seconds to wait for a decision made elsewhere
        #[arg(long, default_value_t = 0)]
        wait: u64,
    },
}

fn parse_state(value: &str) -> Result<PermissionState, String> {
    value
        .trim()
        .to_uppercase()
        .replace('-', "_")
        .parse()
        .map_err(|_| {
            let names: Vec<&str> = PermissionState::ALL.iter().map(|s| s.as_str()).collect();
            format!("expected one of {}", names.join(", "))
        })
}

struct App {
    manager: Arc<P2pPermissionManager>,
    oracle: Arc<StaticOracle>,
    notifier: Arc<TerminalNotificationPresenter>,
    store_path: PathBuf,
}

impl App {
    fn open(cli: &Cli) -> Result<Self> {
        let store_path = cli
            .store
            .clone()
            .unwrap_or_else(|| FilePreferenceStore::default_path(APP_NAME));
        let oracle = Arc::new(StaticOracle::new(cli.granted));
        let notifier = Arc::new(TerminalNotificationPresenter::new());

        let shared = Arc::clone(&oracle);
        let mut config =
            PermissionPresets::file_backed_at(&store_path, move || shared.is_granted())
                .with_context(|| format!("Failed to open store at {}", store_path.display()))?;
        config.notifier = notifier.clone();
        config.advisory = Arc::new(TerminalAdvisoryPresenter);
        if let Some(path) = &cli.messages {
            config.messages = PermissionMessages::from_json_file(path)?;
        }

        Ok(Self {
            manager: Arc::new(P2pPermissionManager::from_config(config)),
            oracle,
            notifier,
            store_path,
        })
    }

    fn status(&self) -> Result<()> {
        let state = self.manager.get_state()?;
        let flags = self.manager.flags()?;
        println!("state:            {}", state);
        println!("enabled:          {}", state.is_allowed());
        println!("rationale shown:  {}", flags.rationale_shown);
        println!("os granted:       {}", self.oracle.is_granted());
        println!("store:            {}", self.store_path.display());
        Ok(())
    }

    async fn request(
        &self,
        explain: bool,
        background: bool,
        rationale: bool,
        wait: u64,
    ) -> Result<bool> {
        let prompt = Arc::new(TerminalPrompt::new(Arc::clone(&self.oracle), rationale));
        let context = if background || !terminal::is_terminal() {
            PresentationContext::Background
        } else {
            PresentationContext::Interactive(prompt.clone())
        };

        let manager = Arc::clone(&self.manager);
        let notifier = Arc::clone(&self.notifier);

        // Terminal input blocks, so the consent flow stays off the async workers
        let (request, mut rx) = tokio::task::spawn_blocking(move || {
            consent_flow(&manager, &notifier, &prompt, explain, &context)
        })
        .await
        .context("Consent flow panicked")??;

        let outcome = match rx.try_recv() {
            Ok(allowed) => Some(allowed),
            Err(_) if wait > 0 => tokio::time::timeout(Duration::from_secs(wait), &mut rx)
                .await
                .ok()
                .and_then(|r| r.ok()),
            Err(_) => None,
        };
        request.close();

        match outcome {
            Some(allowed) => Ok(allowed),
            None => bail!("No decision was made"),
        }
    }
}

/// Start a request and report whatever the user chose in the prompt or notification
fn consent_flow(
    manager: &P2pPermissionManager,
    notifier: &TerminalNotificationPresenter,
    prompt: &TerminalPrompt,
    explain: bool,
    context: &PresentationContext,
) -> Result<(PermissionRequest, oneshot::Receiver<bool>)> {
    let (request, rx) = manager.request_async(explain, context)?;

    // Report what happened in the prompt, as a host would on return from the OS
    if let Some(permanent) = prompt.take_answer() {
        manager.apply_permission_change(permanent)?;
    }
    if let Some(responder) = notifier.take_responder() {
        let action = notifier.read_action()?;
        responder.respond(action)?;
        if action == NotificationAction::Fix {
            request.close();
            bail!("No decision was made");
        }
    }
    Ok((request, rx))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_subscriber_with_config(TracingConfig {
        format: cli.log_format,
        ..Default::default()
    });

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let app = App::open(&cli)?;

    match cli.command {
        Command::Status => app.status()?,
        Command::Set { state } => {
            app.manager.set_state(state)?;
            println!("{}", app.manager.get_state()?);
        }
        Command::Reset => {
            app.manager.reset()?;
            println!("{}", app.manager.get_state()?);
        }
        Command::Apply { permanent } => {
            app.manager.apply_permission_change(permanent)?;
            println!("{}", app.manager.get_state()?);
        }
        Command::Request {
            explain,
            background,
            os_rationale,
            wait,
        } => {
            let allowed = app.request(explain, background, os_rationale, wait).await?;
            println!("{}", if allowed { "allowed" } else { "denied" });
            if !allowed {
                return Ok(ExitCode::from(2));
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
