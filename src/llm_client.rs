//! Provider client for turning a task description into candidate commands.
//!
//! The upstream contract is deliberately thin: a prompt goes up, raw text
//! comes back, or an error with the upstream status preserved. Everything
//! past that point, extracting commands out of whatever the model actually
//! returned, is handled by [`parse_candidates`], a best-effort parser that
//! prefers strict JSON and degrades to line-oriented scraping.

use crate::error::GenerateError;
use crate::http_client::HttpClient;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

/// One generated command proposed for a query.
///
/// Immutable once created; `raw_index` is the command's position in the
/// provider response it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub command: String,
    pub description: String,
    pub raw_index: usize,
}

/// The provider collaborator: prompt in, raw text or error out.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn request(
        &self,
        prompt: &str,
        model: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, GenerateError>;
}

/// Production provider speaking the OpenRouter chat-completions protocol.
pub struct OpenRouterProvider {
    http: Box<dyn HttpClient>,
    base_url: String,
    api_key: String,
}

impl OpenRouterProvider {
    pub fn new(http: Box<dyn HttpClient>, base_url: String, api_key: String) -> Self {
        Self {
            http,
            base_url,
            api_key,
        }
    }

    fn system_prompt() -> &'static str {
        "You generate shell commands with concise descriptions.\n\
         Return STRICT JSON only, no extra text, using this schema:\n\
         {\"commands\": [{\"command\": string, \"description\": string}]}\n\
         Rules:\n\
         - Keep each description under 10 words.\n\
         - macOS/Linux compatible commands.\n\
         - NO text outside the JSON."
    }
}

#[async_trait]
impl CompletionProvider for OpenRouterProvider {
    async fn request(
        &self,
        prompt: &str,
        model: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, GenerateError> {
        let payload = json!({
            "model": model,
            "messages": [
                {"role": "system", "content": Self::system_prompt()},
                {"role": "user", "content": prompt},
            ],
            "max_tokens": max_tokens,
            "temperature": temperature,
        });

        let url = format!("{}/chat/completions", self.base_url);
        let bearer = format!("Bearer {}", self.api_key);
        let headers = [
            ("Authorization", bearer.as_str()),
            ("Content-Type", "application/json"),
        ];

        debug!("Requesting completion from {} with model {}", url, model);
        let response = self
            .http
            .post_json(&url, &headers, &payload)
            .await
            .map_err(|e| GenerateError::Provider {
                status: 0,
                message: e.to_string(),
            })?;

        if !response.is_success() {
            warn!("Provider returned status {}", response.status);
            return Err(GenerateError::Provider {
                status: response.status,
                message: response.body.chars().take(500).collect(),
            });
        }

        let body: serde_json::Value =
            serde_json::from_str(&response.body).map_err(|e| GenerateError::Provider {
                status: response.status,
                message: format!("invalid JSON from provider: {e}"),
            })?;

        body.get("choices")
            .and_then(|c| c.as_array())
            .and_then(|arr| arr.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|t| t.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| GenerateError::Provider {
                status: response.status,
                message: "no completion choices in provider response".to_string(),
            })
    }
}

/// Deterministic provider used in mock mode and in tests.
///
/// Answers with canned raw responses keyed on the prompt content, so the
/// full parsing path is exercised exactly as with a real provider.
pub struct MockProvider {
    calls: Arc<AtomicUsize>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Handle onto the upstream-call counter, for cache tests.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    fn canned_response(prompt: &str) -> String {
        let lowered = prompt.to_lowercase();
        if lowered.contains("unhelpful") {
            // Prose with nothing that parses as a command.
            return "I am sorry, there is no single terminal incantation for that request."
                .to_string();
        }
        if lowered.contains("nodejs") {
            return json!({"commands": [
                {"command": "sudo apt update", "description": "Refresh the package index"},
                {"command": "sudo apt install -y nodejs npm", "description": "Install Node.js and npm"},
            ]})
            .to_string();
        }
        if lowered.contains("compress") || lowered.contains("video") {
            return json!({"commands": [
                {"command": "ffmpeg -i input.mp4 -c:v libx264 -crf 23 output.mp4",
                 "description": "Re-encode the video with H.264"},
            ]})
            .to_string();
        }
        if lowered.contains("wipe") {
            return json!({"commands": [
                {"command": "rm -rf /tmp/scratch", "description": "Remove the scratch directory"},
            ]})
            .to_string();
        }
        let query = prompt.lines().last().unwrap_or(prompt).trim();
        json!({"commands": [
            {"command": format!("echo {query}"), "description": "Echo the request"},
        ]})
        .to_string()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    async fn request(
        &self,
        prompt: &str,
        _model: &str,
        _max_tokens: u32,
        _temperature: f32,
    ) -> Result<String, GenerateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        info!("Using mock provider response");
        Ok(Self::canned_response(prompt))
    }
}

/// Result of parsing a raw provider response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Parsed(Vec<Candidate>),
    Unparseable,
}

const DEFAULT_DESCRIPTION: &str = "No description provided";

/// Command prefixes accepted by the free-form fallback parser.
const COMMON_COMMAND_PREFIXES: [&str; 36] = [
    "ls", "cd", "mkdir", "rm", "cp", "mv", "chmod", "chown", "find", "grep", "cat", "less",
    "tail", "head", "echo", "touch", "wget", "curl", "git", "npm", "pip", "apt", "yum", "brew",
    "docker", "sudo", "ssh", "scp", "ps", "kill", "tar", "zip", "unzip", "ffmpeg", "python",
    "make",
];

static BACKTICK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`").unwrap());

/// Parses a raw provider response into candidates.
///
/// Tries, in order: the strict JSON schema the system prompt asks for,
/// `COMMAND:`/`DESC:` line pairs, shell-prompt-prefixed or command-looking
/// lines, and finally backtick-quoted fragments. Responses with nothing
/// recognizable are tagged `Unparseable` rather than treated as an empty
/// success.
pub fn parse_candidates(raw: &str) -> ParseOutcome {
    if let Some(candidates) = parse_json(raw) {
        debug!("Parsed {} candidates from JSON response", candidates.len());
        return ParseOutcome::Parsed(candidates);
    }
    if let Some(candidates) = parse_labeled_lines(raw) {
        debug!("Parsed {} candidates from COMMAND:/DESC: lines", candidates.len());
        return ParseOutcome::Parsed(candidates);
    }
    if let Some(candidates) = parse_freeform(raw) {
        debug!("Parsed {} candidates from free-form response", candidates.len());
        return ParseOutcome::Parsed(candidates);
    }
    warn!("Provider response contained no parseable commands");
    ParseOutcome::Unparseable
}

fn parse_json(raw: &str) -> Option<Vec<Candidate>> {
    let value: serde_json::Value = serde_json::from_str(raw.trim()).ok()?;
    let items = value.get("commands")?.as_array()?;

    let mut candidates = Vec::new();
    for item in items {
        let Some(command) = item.get("command").and_then(|v| v.as_str()) else {
            continue;
        };
        if command.trim().is_empty() {
            continue;
        }
        let description = item
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_DESCRIPTION);
        candidates.push(Candidate {
            command: command.trim().to_string(),
            description: description.to_string(),
            raw_index: candidates.len(),
        });
    }

    if candidates.is_empty() { None } else { Some(candidates) }
}

fn parse_labeled_lines(raw: &str) -> Option<Vec<Candidate>> {
    let mut candidates: Vec<Candidate> = Vec::new();
    let mut current: Option<(String, Option<String>)> = None;

    let mut flush = |current: &mut Option<(String, Option<String>)>,
                     candidates: &mut Vec<Candidate>| {
        if let Some((command, description)) = current.take() {
            let raw_index = candidates.len();
            candidates.push(Candidate {
                command,
                description: description.unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
                raw_index,
            });
        }
    };

    for line in raw.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("COMMAND:") {
            flush(&mut current, &mut candidates);
            let command = rest.trim();
            if !command.is_empty() {
                current = Some((command.to_string(), None));
            }
        } else if let Some(rest) = line.strip_prefix("DESC:") {
            if let Some((_, description)) = current.as_mut() {
                *description = Some(rest.trim().to_string());
            }
        }
    }
    flush(&mut current, &mut candidates);

    if candidates.is_empty() { None } else { Some(candidates) }
}

/// A bare line counts as a command when its first token is a known command
/// name or an explicit path.
fn looks_like_command(line: &str) -> bool {
    match line.split_whitespace().next() {
        Some(first) => {
            COMMON_COMMAND_PREFIXES.iter().any(|prefix| first == *prefix)
                || first.contains('/')
        }
        None => false,
    }
}

fn parse_freeform(raw: &str) -> Option<Vec<Candidate>> {
    let mut candidates: Vec<Candidate> = Vec::new();

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        // Skip markdown and explanatory prose.
        if ["#", "*", "-", "Here", "To ", "You can", "This will"]
            .iter()
            .any(|marker| line.starts_with(marker))
        {
            continue;
        }

        let stripped = line
            .strip_prefix("$ ")
            .or_else(|| line.strip_prefix("> "))
            .map(str::trim);

        let command = match stripped {
            Some(rest) if !rest.is_empty() => Some(rest),
            _ if looks_like_command(line) => Some(line),
            _ => None,
        };

        if let Some(command) = command {
            let raw_index = candidates.len();
            candidates.push(Candidate {
                command: command.to_string(),
                description: "Auto-detected command".to_string(),
                raw_index,
            });
        }
    }

    // Last resort: backtick-quoted fragments that start with a known command.
    if candidates.is_empty() {
        for caps in BACKTICK_RE.captures_iter(raw) {
            let fragment = caps[1].trim();
            if COMMON_COMMAND_PREFIXES[..10]
                .iter()
                .any(|prefix| fragment.starts_with(prefix))
            {
                let raw_index = candidates.len();
                candidates.push(Candidate {
                    command: fragment.to_string(),
                    description: "Command found in backticks".to_string(),
                    raw_index,
                });
            }
        }
    }

    if candidates.is_empty() { None } else { Some(candidates) }
}
