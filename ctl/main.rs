#![forbid(unsafe_code)]

//! `session-exec-ctl` — command-line client for `session-exec`.
//!
//! Submits a snippet to the server's `/execute` endpoint and prints the
//! captured output, or lists and drops sessions.

use std::io::Read;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "session-exec-ctl",
    about = "Command-line client for the session-exec server",
    version,
    long_about = None
)]
struct Cli {
    /// Base URL of the server.
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a snippet. Reads the code from `--file`, the positional
    /// argument, or stdin, in that order.
    Exec {
        /// Session id to run against; omitted starts a new session.
        #[arg(long)]
        id: Option<String>,
        /// File containing the code.
        #[arg(long)]
        file: Option<PathBuf>,
        /// Inline code.
        code: Option<String>,
    },

    /// List live sessions.
    List,

    /// Destroy a session.
    Drop {
        /// Session id.
        id: String,
    },
}

type CtlResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

fn main() {
    let args = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Failed to start runtime: {err}");
            std::process::exit(1);
        }
    };

    let base = args.url.trim_end_matches('/').to_owned();
    let outcome = runtime.block_on(dispatch(&base, args.command));

    match outcome {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("Failed to reach server: {err}");
            eprintln!("Is session-exec running at '{base}'?");
            std::process::exit(1);
        }
    }
}

async fn dispatch(base: &str, command: Command) -> CtlResult<i32> {
    match command {
        Command::Exec { id, file, code } => exec(base, id, file, code).await,
        Command::List => list(base).await,
        Command::Drop { id } => drop_session(base, &id).await,
    }
}

fn read_code(file: Option<PathBuf>, code: Option<String>) -> CtlResult<String> {
    if let Some(path) = file {
        return Ok(std::fs::read_to_string(path)?);
    }
    if let Some(code) = code {
        return Ok(code);
    }
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

async fn exec(
    base: &str,
    id: Option<String>,
    file: Option<PathBuf>,
    code: Option<String>,
) -> CtlResult<i32> {
    let code = read_code(file, code)?;
    let mut request = serde_json::json!({ "code": code });
    if let Some(id) = id {
        request["id"] = serde_json::Value::String(id);
    }

    let response: serde_json::Value = reqwest::Client::new()
        .post(format!("{base}/execute"))
        .json(&request)
        .send()
        .await?
        .json()
        .await?;

    let field = |name: &str| {
        response
            .get(name)
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_owned()
    };

    println!("Session: {}", field("id"));
    let stdout = field("stdout");
    if !stdout.is_empty() {
        print!("{stdout}");
    }
    let stderr = field("stderr");
    if !stderr.is_empty() {
        eprint!("{stderr}");
    }
    let error = field("error");
    if !error.is_empty() {
        eprintln!("Error: {error}");
        return Ok(1);
    }
    Ok(i32::from(!stderr.is_empty()))
}

async fn list(base: &str) -> CtlResult<i32> {
    let sessions: serde_json::Value = reqwest::get(format!("{base}/sessions"))
        .await?
        .json()
        .await?;
    println!("{}", serde_json::to_string_pretty(&sessions).unwrap_or_default());
    Ok(0)
}

/// URL of the session resource for `id`, with the id percent-encoded as a
/// single path segment.
fn session_url(base: &str, id: &str) -> CtlResult<reqwest::Url> {
    let mut url = reqwest::Url::parse(base)?;
    url.path_segments_mut()
        .map_err(|()| format!("'{base}' cannot serve as a base URL"))?
        .pop_if_empty()
        .extend(["sessions", id]);
    Ok(url)
}

async fn drop_session(base: &str, id: &str) -> CtlResult<i32> {
    let status = reqwest::Client::new()
        .delete(session_url(base, id)?)
        .send()
        .await?
        .status();
    if status.is_success() {
        println!("OK");
        Ok(0)
    } else {
        eprintln!("Error: session {id} not found");
        Ok(1)
    }
}
