//! Command-line front end: one-shot `send`, interactive `chat`, and
//! credential management.

use crate::auth::{CredentialStore, FileCredentialStore, MemoryCredentialStore, Navigator};
use crate::config::Config;
use crate::conversation::{
    ChartFlavor, CompletionPayload, Conversation, ConversationFlavor, ConversationSession,
    DashboardFlavor, UNASSIGNED_SESSION, UserAction,
};
use crate::stream::{StreamCallbacks, StreamDriver, StreamHandle, StreamRequest};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io::{self, Read, Write};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Exit code after Ctrl-C.
const EXIT_INTERRUPTED: u8 = 130;

/// Conversational dashboard and chart builder client
#[derive(Parser, Debug)]
#[command(name = "dashchat", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Server base URL (overrides config and DASHCHAT_BASE_URL)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Debug logging to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send one message and print the reply
    Send(SendArgs),
    /// Interactive conversation on stdin
    Chat(ChatArgs),
    /// Store an access token
    Login {
        /// Access token issued by the server
        token: String,
    },
    /// Remove the stored access token
    Logout,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// The message to send (use "-" to read from stdin)
    pub message: String,

    /// Session to continue (defaults to the server's current session)
    #[arg(short, long)]
    pub session: Option<i64>,

    /// Use the chart conversation instead of the dashboard one
    #[arg(long)]
    pub chart: bool,

    /// Output format
    #[arg(short = 'o', long, default_value = "text", value_enum)]
    pub output_format: OutputFormat,

    /// Response only, no progress
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Session to continue
    #[arg(short, long)]
    pub session: Option<i64>,

    /// Use the chart conversation instead of the dashboard one
    #[arg(long)]
    pub chart: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain response text
    Text,
    /// Full completion payload as JSON
    Json,
}

/// Prints where to sign in instead of navigating a UI.
struct TerminalNavigator {
    base_url: String,
}

impl Navigator for TerminalNavigator {
    fn navigate(&self, path: &str) {
        eprintln!(
            "Session expired. Sign in at {}{path}, then run `dashchat login <token>`.",
            self.base_url
        );
    }
}

pub async fn run(cli: Cli) -> ExitCode {
    init_tracing(cli.verbose);

    match run_inner(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("dashchat=debug")
    } else if let Ok(directives) = std::env::var("DASHCHAT_LOG") {
        tracing_subscriber::EnvFilter::new(directives)
    } else {
        return;
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run_inner(cli: Cli) -> Result<ExitCode> {
    let mut config = Config::load().context("Failed to load config")?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
        config.validate()?;
    }

    let file_store = FileCredentialStore::new(Config::credentials_path());

    match cli.command {
        Commands::Login { token } => {
            file_store.save(token.trim())?;
            eprintln!("Saved credentials to {}", file_store.path().display());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Logout => {
            file_store.remove()?;
            eprintln!("Signed out");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Send(args) => {
            let driver = build_driver(&config, file_store);
            if args.chart {
                run_send::<ChartFlavor>(&config, &driver, args).await
            } else {
                run_send::<DashboardFlavor>(&config, &driver, args).await
            }
        }
        Commands::Chat(args) => {
            let driver = build_driver(&config, file_store);
            if args.chart {
                run_chat::<ChartFlavor>(&config, driver, args.session).await
            } else {
                run_chat::<DashboardFlavor>(&config, driver, args.session).await
            }
        }
    }
}

/// `DASHCHAT_TOKEN` wins over the stored token.
fn build_driver(config: &Config, file_store: FileCredentialStore) -> StreamDriver {
    let credentials: Arc<dyn CredentialStore> = match std::env::var("DASHCHAT_TOKEN") {
        Ok(token) if !token.is_empty() => Arc::new(MemoryCredentialStore::new(Some(token))),
        _ => Arc::new(file_store),
    };
    let navigator = Arc::new(TerminalNavigator {
        base_url: config.base_url.clone(),
    });
    StreamDriver::from_config(config, credentials, navigator)
}

/// Wait for a stream, cancelling it on Ctrl-C. Returns false if interrupted.
async fn join_or_interrupt(handle: StreamHandle) -> bool {
    let cancel = handle.cancel_fn();
    let join = handle.join();
    tokio::pin!(join);

    tokio::select! {
        () = &mut join => true,
        _ = tokio::signal::ctrl_c() => {
            cancel();
            join.await;
            false
        }
    }
}

async fn run_send<F>(config: &Config, driver: &StreamDriver, args: SendArgs) -> Result<ExitCode>
where
    F: ConversationFlavor,
    F::Completion: Serialize,
{
    let message = if args.message == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        args.message
    };
    let message = message.trim().to_string();
    if message.is_empty() {
        anyhow::bail!("Message is empty");
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<std::result::Result<F::Completion, String>>();
    let error_tx = tx.clone();
    let quiet = args.quiet;

    let callbacks = StreamCallbacks::new()
        .on_progress(move |progress| {
            if !quiet {
                eprintln!("[{}] {}", progress.phase, progress.message);
            }
        })
        .on_complete(move |payload| {
            let _ = tx.send(Ok(payload));
        })
        .on_error(move |reason| {
            let _ = error_tx.send(Err(reason));
        });

    let handle = driver.start_stream(
        &F::endpoint(config),
        StreamRequest::new(message, args.session),
        callbacks,
    );
    if !join_or_interrupt(handle).await {
        eprintln!("Cancelled");
        return Ok(ExitCode::from(EXIT_INTERRUPTED));
    }

    match rx.try_recv() {
        Ok(Ok(payload)) => {
            match args.output_format {
                OutputFormat::Text => {
                    println!("{}", payload.response());
                    if !quiet {
                        eprintln!(
                            "(session {}, phase {})",
                            payload.session_id(),
                            payload.phase()
                        );
                    }
                }
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&payload)?),
            }
            Ok(ExitCode::SUCCESS)
        }
        Ok(Err(reason)) => {
            eprintln!("Error: {reason}");
            Ok(ExitCode::FAILURE)
        }
        // 401 (already reported by the navigator) or a stream that ended early.
        Err(_) => {
            eprintln!("No response received");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run_chat<F: ConversationFlavor>(
    config: &Config,
    driver: StreamDriver,
    session: Option<i64>,
) -> Result<ExitCode> {
    let session = ConversationSession::new(session.unwrap_or(UNASSIGNED_SESSION));
    let conversation = Conversation::<F>::new(driver, config, session);

    eprintln!(
        "{} conversation. Commands: /finish, /accept, /new <id>, /quit",
        F::NAME
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("[{}] > ", conversation.phase());
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }
        if let Some(id) = line.strip_prefix("/new") {
            match id.trim().parse::<i64>() {
                Ok(id) => {
                    conversation.new_conversation(id);
                    eprintln!("Started conversation {id}");
                }
                Err(_) => eprintln!("Usage: /new <session id>"),
            }
            continue;
        }

        let before = conversation.session().messages().len();
        let sent = match UserAction::from_command(line) {
            Some(action) => conversation.perform(action, progress_printer()),
            None => conversation.send_with(line, progress_printer()),
        };
        let handle = match sent {
            Ok(handle) => handle,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };

        if !join_or_interrupt(handle).await {
            eprintln!("Cancelled");
            continue;
        }

        let session = conversation.session();
        // Skip the user line we just added.
        for message in session.messages().iter().skip(before + 1) {
            println!("{}", message.content);
        }
        if let Some(error) = &session.last_error {
            eprintln!("Error: {error}");
        }
        if session.complete {
            eprintln!("Conversation complete. Use /new <id> to start another.");
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn progress_printer<C>() -> StreamCallbacks<C> {
    StreamCallbacks::new().on_progress(|progress| {
        eprintln!("  [{}] {}", progress.phase, progress.message);
    })
}
