use std::io::{self, BufRead, Read};
use std::time::Duration;

use serde_json::{json, Value};

use crate::api::PortalClient;
use crate::cli::config::{load_session, CliSession};
use crate::cli::OutputFormat;
use crate::config;

/// Output a success message in the appropriate format
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let Some(Value::Object(extra)) = data {
                if let Some(object) = response.as_object_mut() {
                    object.extend(extra);
                }
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output an empty collection in the appropriate format
pub fn output_empty_collection(output_format: &OutputFormat, collection_name: &str, message: &str) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ collection_name: [] }))?);
        }
        OutputFormat::Text => {
            println!("{}", message);
        }
    }
    Ok(())
}

/// Resolve the backend URL: flag/env first, then the signed-in session, then config
pub fn resolve_base_url(api_url: Option<String>, session: &CliSession) -> String {
    api_url
        .or_else(|| session.base_url.clone())
        .unwrap_or_else(|| config::config().api.base_url.clone())
}

pub fn client(api_url: Option<String>) -> anyhow::Result<PortalClient> {
    let session = load_session()?;
    let base_url = resolve_base_url(api_url, &session);
    let timeout = Duration::from_secs(config::config().api.timeout_secs);
    Ok(PortalClient::new(base_url, timeout)?)
}

/// Client carrying the stored access token; fails when nobody is signed in
pub fn authenticated_client(api_url: Option<String>) -> anyhow::Result<PortalClient> {
    let session = load_session()?;
    let token = session
        .access_token
        .clone()
        .ok_or_else(|| anyhow::anyhow!("Not signed in. Run `portal auth login <identifier>` first"))?;
    let base_url = resolve_base_url(api_url, &session);
    let timeout = Duration::from_secs(config::config().api.timeout_secs);
    Ok(PortalClient::new(base_url, timeout)?.with_access_token(token))
}

/// Read one line (a password, an activation code) from stdin
pub fn read_line(prompt: &str) -> anyhow::Result<String> {
    eprint!("{}", prompt);
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(&['\r', '\n'][..]).to_string())
}

/// Read a JSON document from stdin
pub fn read_json_stdin() -> anyhow::Result<Value> {
    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;
    if input.trim().is_empty() {
        return Err(anyhow::anyhow!("Expected a JSON document on stdin"));
    }
    Ok(serde_json::from_str(&input)?)
}

/// Best display name of a record: `fullName`, then `judul`, then `email`
pub fn record_label(record: &Value) -> &str {
    ["fullName", "judul", "email"]
        .iter()
        .find_map(|key| record.get(*key).and_then(Value::as_str))
        .unwrap_or("-")
}
