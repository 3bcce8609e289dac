//! Top-level request flow: generation, selection, customization, execution.
//!
//! The router owns every component for one CLI invocation and passes them
//! explicitly; there is no process-wide state. Errors stay local to one
//! candidate or query; a failed or declined command never takes the whole
//! run down unless the sequence policy says to stop.

use crate::cache::{CacheStats, ResponseCache};
use crate::config::Config;
use crate::error::{GateError, GenerateError};
use crate::executor::{ExecutionGate, ExecutionOutcome, ProcessRunner, ShellRunner};
use crate::history::CommandHistory;
use crate::http_client::ReqwestHttpClient;
use crate::llm_client::{Candidate, CompletionProvider, MockProvider, OpenRouterProvider};
use crate::orchestrator::Orchestrator;
use crate::providers::{Clipboard, SystemClipboard};
use crate::session::{should_continue_sequence, Effect, InputEvent, InteractiveSession};
use crate::ui::{ConsoleUi, CustomizeFlow, SelectAction};
use anyhow::{anyhow, Result};
use std::io::{self, BufRead, Write};
use tracing::{info, warn};

/// How one candidate's run ended.
#[derive(Debug)]
pub enum CandidateRun {
    Executed(ExecutionOutcome),
    Cancelled,
    LaunchFailed,
}

pub struct Router<R: ProcessRunner = ShellRunner> {
    config: Config,
    orchestrator: Orchestrator,
    gate: ExecutionGate<R>,
    history: CommandHistory,
    ui: ConsoleUi,
    clipboard: Box<dyn Clipboard>,
}

impl Router<ShellRunner> {
    /// Builds the production router from configuration.
    pub fn new(config: Config, verbose: bool) -> Result<Self> {
        let provider: Box<dyn CompletionProvider> = if config.is_mock_mode() {
            info!("Using mock provider (QUOMODO_USE_MOCK=1)");
            Box::new(MockProvider::new())
        } else {
            let api_key = config.api_key.clone().ok_or_else(|| {
                anyhow!(
                    "No API key found. Please set it using one of these methods:\n\
                     \n\
                     1. Set API key in config:\n\
                     \x20  quo --set-api-key sk-or-your-key-here\n\
                     \n\
                     2. Set environment variable:\n\
                     \x20  export QUOMODO_API_KEY=sk-or-your-key-here\n\
                     \n\
                     3. Check current config:\n\
                     \x20  quo --config"
                )
            })?;
            Box::new(OpenRouterProvider::new(
                Box::new(ReqwestHttpClient::new()),
                config.base_url.clone(),
                api_key,
            ))
        };

        let config_dir = Config::get_config_dir()?;
        let cache = ResponseCache::open(config_dir.clone())?;
        let history = CommandHistory::open(config_dir)?;
        let orchestrator = Orchestrator::new(provider, cache, &config);

        Ok(Self {
            orchestrator,
            gate: ExecutionGate::new(),
            history,
            ui: ConsoleUi::new(verbose),
            clipboard: Box::new(SystemClipboard),
            config,
        })
    }
}

impl<R: ProcessRunner> Router<R> {
    /// Builds a router from explicit parts (for testing).
    pub fn with_components(
        config: Config,
        provider: Box<dyn CompletionProvider>,
        cache: ResponseCache,
        history: CommandHistory,
        gate: ExecutionGate<R>,
        clipboard: Box<dyn Clipboard>,
        verbose: bool,
    ) -> Self {
        let orchestrator = Orchestrator::new(provider, cache, &config);
        Self {
            orchestrator,
            gate,
            history,
            ui: ConsoleUi::new(verbose),
            clipboard,
            config,
        }
    }

    /// Cache counters for this invocation, for maintenance and tests.
    pub fn cache_stats(&self) -> CacheStats {
        self.orchestrator.cache().stats()
    }

    /// Runs one query end to end against stdin/stdout.
    pub async fn process_query(&self, query: &str, context: Option<&str>, dry_run: bool) -> Result<()> {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut output = io::stdout();
        self.process_query_with_io(query, context, dry_run, &mut input, &mut output)
            .await
    }

    /// Runs one query end to end with injected I/O streams.
    pub async fn process_query_with_io<In: BufRead, Out: Write>(
        &self,
        query: &str,
        context: Option<&str>,
        dry_run: bool,
        input: &mut In,
        output: &mut Out,
    ) -> Result<()> {
        let candidates = match self.orchestrator.generate(query, context).await {
            Ok(candidates) => candidates,
            Err(GenerateError::EmptyResponse) => {
                writeln!(output, "No commands could be generated for this request.")?;
                return Ok(());
            }
            // Provider failures surface verbatim; retrying is not this layer's job.
            Err(e) => return Err(e.into()),
        };

        self.ui.display_candidates_with_io(&candidates, output)?;

        if dry_run {
            writeln!(output, "\nDry run - nothing will be executed.")?;
            return Ok(());
        }

        let action = self
            .ui
            .prompt_select_with_io(candidates.len(), input, output)?;

        match action {
            SelectAction::Cancel => Ok(()),
            SelectAction::Copy(index) => {
                let command = &candidates[index].command;
                match self.clipboard.write(command) {
                    Ok(()) => writeln!(output, "● Copied to clipboard: {command}")?,
                    Err(e) => {
                        warn!("Clipboard write failed: {}", e);
                        writeln!(output, "Clipboard unavailable; command was: {command}")?;
                    }
                }
                Ok(())
            }
            SelectAction::Choose(index) => {
                self.run_candidate(&candidates, index, query, input, output)
                    .await?;
                Ok(())
            }
            SelectAction::All => self.run_sequence(&candidates, query, input, output).await,
        }
    }

    /// Runs every candidate in order, honoring the continue-on-failure policy.
    async fn run_sequence<In: BufRead, Out: Write>(
        &self,
        candidates: &[Candidate],
        query: &str,
        input: &mut In,
        output: &mut Out,
    ) -> Result<()> {
        let mut results: Vec<(String, bool)> = Vec::new();

        for index in 0..candidates.len() {
            writeln!(output, "\nCommand {}/{}", index + 1, candidates.len())?;
            let run = self
                .run_candidate(candidates, index, query, input, output)
                .await?;

            match run {
                CandidateRun::Executed(outcome) => {
                    results.push((candidates[index].command.clone(), outcome.success()));
                    if !should_continue_sequence(&outcome, self.config.continue_on_failure) {
                        writeln!(output, "Stopping sequence after failed command.")?;
                        for rest in &candidates[index + 1..] {
                            results.push((rest.command.clone(), false));
                        }
                        break;
                    }
                }
                // A declined command is skipped, not a sequence failure.
                CandidateRun::Cancelled => {
                    results.push((candidates[index].command.clone(), false));
                }
                CandidateRun::LaunchFailed => {
                    results.push((candidates[index].command.clone(), false));
                    if !self.config.continue_on_failure {
                        writeln!(output, "Stopping sequence after launch failure.")?;
                        for rest in &candidates[index + 1..] {
                            results.push((rest.command.clone(), false));
                        }
                        break;
                    }
                }
            }
        }

        self.ui.show_summary_with_io(&results, output)?;
        Ok(())
    }

    /// Walks one candidate through a fresh session: customization,
    /// confirmation, execution, history.
    async fn run_candidate<In: BufRead, Out: Write>(
        &self,
        candidates: &[Candidate],
        index: usize,
        query: &str,
        input: &mut In,
        output: &mut Out,
    ) -> Result<CandidateRun> {
        let mut session =
            InteractiveSession::new(candidates.to_vec(), self.config.require_confirmation);

        let effect = session.apply(InputEvent::Select(index))?;
        let flow = match effect {
            Effect::Execute { command } => CustomizeFlow::Execute(command),
            _ => self
                .ui
                .customize_with_io(&mut session, self.clipboard.as_ref(), input, output)?,
        };

        match flow {
            CustomizeFlow::Cancelled => {
                let command = session
                    .customization()
                    .map(|c| c.effective_command())
                    .unwrap_or_else(|| candidates[index].command.clone());
                self.log_history(query, &command, false);
                Ok(CandidateRun::Cancelled)
            }
            CustomizeFlow::Execute(command) => {
                let cwd = std::env::current_dir()?;
                match self
                    .gate
                    .execute(&command, &cwd, self.config.execution_timeout())
                    .await
                {
                    Ok(outcome) => {
                        self.ui.show_outcome_with_io(&outcome, output)?;
                        self.log_history(query, &command, outcome.success());
                        session.complete_execution(outcome.clone())?;
                        Ok(CandidateRun::Executed(outcome))
                    }
                    Err(GateError::Launch(e)) => {
                        writeln!(output, "✗ {e}")?;
                        self.log_history(query, &command, false);
                        Ok(CandidateRun::LaunchFailed)
                    }
                    Err(GateError::Incomplete(e)) => {
                        // The session blocks incomplete commits, so this only
                        // fires if an edit smuggled a placeholder back in.
                        writeln!(output, "⚠️  {e}")?;
                        self.log_history(query, &command, false);
                        Ok(CandidateRun::LaunchFailed)
                    }
                }
            }
        }
    }

    /// History is observational; a write failure is logged, never fatal.
    fn log_history(&self, query: &str, command: &str, success: bool) {
        let record = self.history.record(query, command, success);
        if let Err(e) = self.history.append(&record) {
            warn!("Failed to record history entry: {}", e);
        }
    }
}
