//! Command-line client for the woahlife journal API.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use serde_json::Value;
use std::io::{self, Read};
use std::time::Duration;
use woahlife_core::constants::DEFAULT_CLI_SERVER_URL;
use woahlife_core::models::DateKey;

#[derive(Parser)]
#[command(name = "woahlife", about = "woahlife journal CLI", version)]
struct Cli {
    /// Server URL (can also be set via WOAHLIFE_SERVER env var)
    #[arg(short, long, env = "WOAHLIFE_SERVER")]
    server: Option<String>,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    json: bool,

    /// Request timeout in seconds
    #[arg(short = 't', long, default_value = "30")]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
    /// Append an entry (from TEXT, --file, or stdin)
    Write {
        text: Option<String>,
        #[arg(short, long)]
        file: Option<String>,
        /// Day as YYYYMMDD; defaults to today on the server
        #[arg(short, long, value_parser = parse_date_key)]
        date: Option<DateKey>,
    },
    /// Show the indexed entries for one day
    Get {
        #[arg(value_parser = parse_date_key)]
        date: DateKey,
    },
    /// Full-text search across days
    Search {
        query: String,
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Print a year of entries as plain text
    Export { year: u16 },
}

fn parse_date_key(value: &str) -> Result<DateKey, String> {
    value.trim().parse::<DateKey>().map_err(|err| err.to_string())
}

fn error_message_for_response(status: reqwest::StatusCode, body: &str) -> String {
    if body.trim().is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string();
    }

    if let Ok(value) = serde_json::from_str::<Value>(body) {
        return value
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or(body)
            .to_string();
    }

    body.to_string()
}

async fn ensure_success_or_exit(res: reqwest::Response, action: &str) -> reqwest::Response {
    let status = res.status();
    if status.is_success() {
        return res;
    }

    let body = match res.text().await {
        Ok(body) => body,
        Err(err) => format!("failed to read error response body: {}", err),
    };
    let message = error_message_for_response(status, &body);
    eprintln!("{} failed ({}): {}", action, status, message);
    std::process::exit(1);
}

fn exit_with(action: &str, message: String) -> ! {
    eprintln!("{} failed: {}", action, message);
    std::process::exit(1);
}

fn pretty_json(value: &Value) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|err| format!("response encoding error: {}", err))
}

fn format_write_output(response: &Value, json: bool) -> Result<String, String> {
    if json {
        return pretty_json(response);
    }

    let date = response
        .get("date")
        .and_then(Value::as_u64)
        .ok_or_else(|| "response missing 'date' field".to_string())?;
    let count = response
        .get("entry_count")
        .and_then(Value::as_u64)
        .ok_or_else(|| "response missing 'entry_count' field".to_string())?;
    let created = response
        .get("created")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    Ok(if created {
        format!("Started {} with its first entry", date)
    } else {
        format!("Added entry {} to {}", count, date)
    })
}

fn document_entries(document: &Value) -> Result<Vec<&str>, String> {
    document
        .get("entries")
        .and_then(Value::as_array)
        .ok_or_else(|| "response missing 'entries' field".to_string())?
        .iter()
        .map(|entry| {
            entry
                .as_str()
                .ok_or_else(|| "entry is not a string".to_string())
        })
        .collect()
}

fn format_get_output(document: &Value, json: bool) -> Result<String, String> {
    if json {
        return pretty_json(document);
    }

    let heading = document
        .get("prettyDate")
        .and_then(Value::as_str)
        .ok_or_else(|| "response missing 'prettyDate' field".to_string())?;
    let mut sections = vec![heading.to_string()];
    sections.extend(document_entries(document)?.into_iter().map(str::to_string));
    Ok(sections.join("\n\n"))
}

fn preview(text: &str, max_chars: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    let mut preview: String = line.chars().take(max_chars).collect();
    if line.chars().count() > max_chars || text.lines().nth(1).is_some() {
        preview.push_str("...");
    }
    preview
}

fn format_search_output(documents: &[Value], json: bool) -> Result<String, String> {
    if json {
        return serde_json::to_string_pretty(documents)
            .map_err(|err| format!("response encoding error: {}", err));
    }

    let mut rows = Vec::with_capacity(documents.len());
    for (index, document) in documents.iter().enumerate() {
        let Some(id) = document.get("objectID").and_then(Value::as_str) else {
            return Err(format!("response item {} missing 'objectID' field", index));
        };
        let first = document_entries(document)?
            .first()
            .map(|entry| preview(entry, 60))
            .unwrap_or_default();
        rows.push(format!("{:<10} {}", id, first));
    }

    Ok(rows.join("\n"))
}

fn api_url(server: &str, segments: &[&str]) -> Result<reqwest::Url, String> {
    let mut url = reqwest::Url::parse(server)
        .map_err(|err| format!("Invalid server URL '{}': {}", server, err))?;
    let mut path = url
        .path_segments_mut()
        .map_err(|_| "Server URL cannot be used as an API base".to_string())?;
    path.pop_if_empty();
    for segment in segments {
        path.push(segment);
    }
    drop(path);
    Ok(url)
}

fn api_url_or_exit(server: &str, action: &str, segments: &[&str]) -> reqwest::Url {
    api_url(server, segments).unwrap_or_else(|message| exit_with(action, message))
}

fn normalize_server(server: String) -> String {
    if let Ok(mut url) = reqwest::Url::parse(&server) {
        let should_normalize_localhost =
            url.scheme().eq_ignore_ascii_case("http") && url.host_str() == Some("localhost");
        if should_normalize_localhost && url.set_host(Some("127.0.0.1")).is_err() {
            return server;
        }
        let mut normalized = url.to_string();
        while normalized.ends_with('/') {
            normalized.pop();
        }
        return normalized;
    }
    server
}

fn resolve_server(server: Option<String>) -> String {
    server
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_CLI_SERVER_URL.to_string())
}

fn read_entry_text(text: Option<String>, file: Option<String>) -> io::Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }
    if let Some(path) = file {
        return std::fs::read_to_string(path);
    }
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    Ok(buffer)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let Cli {
        server,
        json,
        timeout,
        command,
    } = Cli::parse();

    if let Commands::Completions { shell } = &command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(*shell, &mut cmd, name, &mut io::stdout());
        return Ok(());
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout))
        .build()?;
    let server = normalize_server(resolve_server(server));

    match command {
        Commands::Completions { .. } => unreachable!("completions handled before client setup"),
        Commands::Write { text, file, date } => {
            let endpoint = api_url_or_exit(&server, "Write", &["api", "entries"]);
            let text = read_entry_text(text, file)?;
            let mut body = serde_json::json!({ "text": text });
            if let Some(date) = date {
                body["date"] = date.value().into();
            }

            let res = client.post(endpoint).json(&body).send().await?;
            let res = ensure_success_or_exit(res, "Write").await;
            let response: Value = res.json().await?;
            let output = format_write_output(&response, json)
                .unwrap_or_else(|message| exit_with("Write", message));
            println!("{}", output);
        }
        Commands::Get { date } => {
            let id = date.object_id();
            let endpoint = api_url_or_exit(&server, "Get", &["api", "entries", id.as_str()]);
            let res = client.get(endpoint).send().await?;
            let res = ensure_success_or_exit(res, "Get").await;
            let document: Value = res.json().await?;
            let output = format_get_output(&document, json)
                .unwrap_or_else(|message| exit_with("Get", message));
            println!("{}", output);
        }
        Commands::Search { query, limit } => {
            let endpoint = api_url_or_exit(&server, "Search", &["api", "search"]);
            let res = client
                .get(endpoint)
                .query(&[("q", query.as_str()), ("limit", limit.to_string().as_str())])
                .send()
                .await?;
            let res = ensure_success_or_exit(res, "Search").await;
            let documents: Vec<Value> = res.json().await?;
            let output = format_search_output(&documents, json)
                .unwrap_or_else(|message| exit_with("Search", message));
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Commands::Export { year } => {
            let year = year.to_string();
            let endpoint = api_url_or_exit(&server, "Export", &["api", "export", year.as_str()]);
            let res = client.get(endpoint).send().await?;
            let res = ensure_success_or_exit(res, "Export").await;
            print!("{}", res.text().await?);
        }
    }

    Ok(())
}
