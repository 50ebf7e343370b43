use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use smartdash::responder::FormFields;
use smartdash::services::chat::ChatEvent;
use smartdash::services::form::{FORM_FIELDS, FormError};
use smartdash::{
    ChatSession, ChatStatus, DashboardConfig, FormAssistant, MockResponder, RequestState, RequestStatus,
    ResponseSource, SmartSearch,
};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Form(#[from] FormError),
    #[error("JSON encode failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("stdout write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    RequestFailed(String),
}

#[derive(Parser, Debug)]
#[command(name = "smartdash", about = "Drive the dashboard's AI widgets from a terminal")]
struct Cli {
    /// Skip simulated latency and injected failures.
    #[arg(long, env = "SMARTDASH_INSTANT")]
    instant: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one debounced search and print the result.
    Search { query: String },
    /// Replay `text` one keystroke at a time through the search box.
    Type {
        text: String,
        #[arg(long, default_value_t = 120)]
        keystroke_ms: u64,
    },
    /// Send each message in turn and stream the replies.
    Chat {
        #[arg(required = true)]
        messages: Vec<String>,
    },
    /// Fetch suggestions for a form field.
    Suggest {
        field: String,
        #[arg(default_value = "")]
        partial: String,
    },
    /// Validate a form.
    Validate {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        company: Option<String>,
        #[arg(long)]
        role: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("smartdash=info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = if cli.instant { DashboardConfig::from_env().instant() } else { DashboardConfig::from_env() };
    tracing::debug!(?config, "dashboard config loaded");
    let source: Arc<dyn ResponseSource> = Arc::new(MockResponder::new(config));

    match cli.command {
        Command::Search { query } => run_search(&source, config, &[query], Duration::ZERO).await,
        Command::Type { text, keystroke_ms } => {
            let prefixes = keystrokes(&text);
            tracing::info!(keystroke_ms, keystrokes = prefixes.len(), "replaying keystrokes");
            run_search(&source, config, &prefixes, Duration::from_millis(keystroke_ms)).await
        }
        Command::Chat { messages } => run_chat(&source, &messages).await,
        Command::Suggest { field, partial } => run_suggest(&source, config, &field, &partial).await,
        Command::Validate { name, email, company, role } => {
            let mut fields = FormFields::new();
            for (field, value) in [("name", name), ("email", email), ("company", company), ("role", role)] {
                if let Some(value) = value {
                    fields.insert(field.to_string(), value);
                }
            }
            run_validate(&source, config, fields).await
        }
    }
}

fn keystrokes(text: &str) -> Vec<String> {
    text.char_indices()
        .map(|(i, c)| text[..i + c.len_utf8()].to_string())
        .collect()
}

/// Wait until the state read by `read` settles in success or error.
async fn settle<T>(mut rx: watch::Receiver<u64>, read: impl Fn() -> RequestState<T>) -> RequestState<T> {
    loop {
        let state = read();
        if matches!(state.status, RequestStatus::Success | RequestStatus::Error) {
            return state;
        }
        if rx.changed().await.is_err() {
            return read();
        }
    }
}

fn print_json(value: &impl Serialize) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn into_result<T>(state: &RequestState<T>) -> Result<(), CliError> {
    match (&state.status, &state.error) {
        (RequestStatus::Error, Some(message)) => Err(CliError::RequestFailed(message.clone())),
        _ => Ok(()),
    }
}

async fn run_search(
    source: &Arc<dyn ResponseSource>,
    config: DashboardConfig,
    typed: &[String],
    keystroke: Duration,
) -> Result<(), CliError> {
    let search = SmartSearch::new(Arc::clone(source), config.search_debounce);
    let rx = search.subscribe();
    for (i, query) in typed.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(keystroke).await;
        }
        search.set_query(query.as_str());
    }
    if typed.last().is_none_or(|query| query.trim().is_empty()) {
        return print_json(&search.state());
    }

    let state = settle(rx, || search.state()).await;
    print_json(&state)?;
    into_result(&state)
}

async fn run_chat(source: &Arc<dyn ResponseSource>, messages: &[String]) -> Result<(), CliError> {
    let session = ChatSession::new(Arc::clone(source));
    let mut events = session.subscribe();
    let mut stdout = std::io::stdout();

    for message in messages {
        writeln!(stdout, "> {message}")?;
        let turn = session.send(message);
        tokio::pin!(turn);
        let mut printed = 0;
        loop {
            tokio::select! {
                _ = &mut turn => {
                    while let Ok(event) = events.try_recv() {
                        print_fragment(&mut stdout, &event, &mut printed)?;
                    }
                    break;
                }
                Some(event) = events.recv() => print_fragment(&mut stdout, &event, &mut printed)?,
            }
        }
        writeln!(stdout)?;

        let state = session.snapshot();
        if state.status == ChatStatus::Error {
            return Err(CliError::RequestFailed(state.error.unwrap_or_default()));
        }
    }
    Ok(())
}

/// Print the unseen tail of a streamed reply.
fn print_fragment(out: &mut impl Write, event: &ChatEvent, printed: &mut usize) -> Result<(), CliError> {
    if let ChatEvent::FragmentReceived { fragment, .. } = event {
        let tail = fragment.content.get(*printed..).unwrap_or(&fragment.content);
        write!(out, "{tail}")?;
        out.flush()?;
        *printed = fragment.content.len();
    }
    Ok(())
}

async fn run_suggest(
    source: &Arc<dyn ResponseSource>,
    config: DashboardConfig,
    field: &str,
    partial: &str,
) -> Result<(), CliError> {
    let form = FormAssistant::new(Arc::clone(source), config.suggest_debounce);
    let rx = form.subscribe();
    form.set_field(field, partial)?;

    let state = settle(rx, || form.suggestions(field)).await;
    print_json(&state)?;
    into_result(&state)
}

async fn run_validate(
    source: &Arc<dyn ResponseSource>,
    config: DashboardConfig,
    fields: FormFields,
) -> Result<(), CliError> {
    let form = FormAssistant::new(Arc::clone(source), config.suggest_debounce);
    for field in FORM_FIELDS {
        if let Some(value) = fields.get(field) {
            form.set_field(field, value.as_str())?;
        }
    }

    let state = form.validate().await;
    print_json(&serde_json::json!({ "status": form.form_status(), "validation": state }))?;
    into_result(&state)
}
