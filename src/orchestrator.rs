//! Generation orchestration: cache-checked candidate generation.
//!
//! The orchestrator is the only component that talks to the provider. It
//! fingerprints the request, consults the response cache, and only on a
//! miss performs a single upstream call, parses the raw text into
//! candidates, and populates the cache. Provider failures propagate with
//! their upstream detail preserved and are never cached.

use crate::cache::{fingerprint, ResponseCache};
use crate::config::Config;
use crate::error::GenerateError;
use crate::llm_client::{parse_candidates, Candidate, CompletionProvider, ParseOutcome};
use std::time::Duration;
use tracing::{info, warn};

pub struct Orchestrator {
    provider: Box<dyn CompletionProvider>,
    cache: ResponseCache,
    model: String,
    max_tokens: u32,
    temperature: f32,
    cache_ttl: Duration,
    max_commands: usize,
}

impl Orchestrator {
    pub fn new(provider: Box<dyn CompletionProvider>, cache: ResponseCache, config: &Config) -> Self {
        Self {
            provider,
            cache,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            cache_ttl: config.cache_ttl(),
            max_commands: config.max_commands_per_request,
        }
    }

    /// Generates candidates for a query, consulting the cache first.
    ///
    /// # Errors
    ///
    /// * [`GenerateError::Provider`] - the upstream call failed; detail preserved
    /// * [`GenerateError::EmptyResponse`] - the response held no parseable command
    pub async fn generate(
        &self,
        query: &str,
        context: Option<&str>,
    ) -> Result<Vec<Candidate>, GenerateError> {
        let fp = fingerprint(query, context, &self.model, self.max_tokens, self.temperature);

        if let Some(candidates) = self.cache.get(&fp) {
            info!("Returning {} cached candidates for query", candidates.len());
            return Ok(candidates);
        }

        info!("Cache miss, requesting candidates from provider");
        let prompt = build_prompt(query, context);
        let raw = self
            .provider
            .request(&prompt, &self.model, self.max_tokens, self.temperature)
            .await?;

        match parse_candidates(&raw) {
            ParseOutcome::Parsed(mut candidates) => {
                if candidates.len() > self.max_commands {
                    warn!(
                        "Response held {} commands, truncating to {}",
                        candidates.len(),
                        self.max_commands
                    );
                    candidates.truncate(self.max_commands);
                }
                self.cache.put(&fp, candidates.clone(), self.cache_ttl);
                Ok(candidates)
            }
            ParseOutcome::Unparseable => Err(GenerateError::EmptyResponse),
        }
    }

    /// The underlying cache, for stats and maintenance commands.
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }
}

/// Builds the user prompt. The query stays on the final line so providers
/// (and the mock) can key off it directly.
fn build_prompt(query: &str, context: Option<&str>) -> String {
    match context {
        Some(context) if !context.trim().is_empty() => {
            format!("Context: {}\n\n{}", context.trim(), query)
        }
        _ => query.to_string(),
    }
}
