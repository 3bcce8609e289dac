//! Console prompts for selecting, customizing, and confirming commands.
//!
//! Every prompt takes its input and output streams as arguments, so the
//! whole interactive flow can be tested by feeding scripted lines through a
//! `Cursor` and asserting on the captured output. The convenience wrappers
//! at the bottom bind the prompts to stdin/stdout.
//!
//! This module only translates lines into [`InputEvent`]s and renders
//! state; every transition decision lives in [`crate::session`].

use crate::executor::ExecutionOutcome;
use crate::llm_client::Candidate;
use crate::providers::Clipboard;
use crate::safety::RiskVerdict;
use crate::session::{Effect, InputEvent, InteractiveSession, SessionError, SessionState};
use anyhow::{anyhow, Result};
use std::io::{self, BufRead, Write};
use tracing::{info, warn};

/// What the user chose on the candidate list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectAction {
    /// Run the candidate at this index.
    Choose(usize),
    /// Run every candidate in sequence.
    All,
    /// Copy the candidate at this index to the clipboard and stop.
    Copy(usize),
    Cancel,
}

/// How a customization run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomizeFlow {
    /// The session committed this fully substituted command.
    Execute(String),
    Cancelled,
}

pub struct ConsoleUi {
    verbose: bool,
}

impl ConsoleUi {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    // =========================================================================
    // Core methods with I/O injection (testable)
    // =========================================================================

    /// Displays the candidate list with parameter spans marked.
    pub fn display_candidates_with_io<W: Write>(
        &self,
        candidates: &[Candidate],
        output: &mut W,
    ) -> Result<()> {
        writeln!(output)?;
        if candidates.len() > 1 {
            writeln!(output, "Select a command ({} available):", candidates.len())?;
        } else {
            writeln!(output, "Command ready:")?;
        }
        writeln!(output)?;

        for (i, candidate) in candidates.iter().enumerate() {
            writeln!(output, "  {}. {}", i + 1, highlight_parameters(&candidate.command))?;
            writeln!(output, "     {}", candidate.description)?;
        }
        Ok(())
    }

    /// Prompts for a selection action.
    ///
    /// Accepts a number, `a`/`all` for a full sequence, `c <n>` to copy, and
    /// `q` (or end of input) to quit. Invalid input re-prompts.
    pub fn prompt_select_with_io<R: BufRead, W: Write>(
        &self,
        count: usize,
        input: &mut R,
        output: &mut W,
    ) -> Result<SelectAction> {
        loop {
            write!(output, "\nRun which command? (1-{count}, a=all, c=copy, q=quit): ")?;
            output.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                return Ok(SelectAction::Cancel);
            }
            let choice = line.trim();

            match choice {
                "q" | "quit" | "esc" => return Ok(SelectAction::Cancel),
                "a" | "all" => return Ok(SelectAction::All),
                "" => return Ok(SelectAction::Choose(0)),
                _ => {}
            }

            if let Some(rest) = choice.strip_prefix('c') {
                let rest = rest.trim();
                let index = if rest.is_empty() {
                    Some(1)
                } else {
                    rest.parse::<usize>().ok()
                };
                if let Some(index) = index.filter(|i| (1..=count).contains(i)) {
                    return Ok(SelectAction::Copy(index - 1));
                }
            } else if let Ok(number) = choice.parse::<usize>() {
                if number >= 1 && number <= count {
                    return Ok(SelectAction::Choose(number - 1));
                }
            }

            writeln!(output, "Invalid choice. Enter a number between 1 and {count}.")?;
        }
    }

    /// Drives a session through customization and confirmation.
    ///
    /// The caller has already applied [`InputEvent::Select`]; this loop
    /// translates lines into events until the session asks for execution or
    /// is cancelled.
    pub fn customize_with_io<R: BufRead, W: Write>(
        &self,
        session: &mut InteractiveSession,
        clipboard: &dyn Clipboard,
        input: &mut R,
        output: &mut W,
    ) -> Result<CustomizeFlow> {
        loop {
            match session.state() {
                SessionState::Customizing => {
                    self.render_customization(session, output)?;

                    let mut line = String::new();
                    if input.read_line(&mut line)? == 0 {
                        session.apply(InputEvent::Cancel).ok();
                        return Ok(CustomizeFlow::Cancelled);
                    }
                    let line = line.trim();

                    let event = match line {
                        "" => InputEvent::Commit,
                        "tab" | "n" | "next" => InputEvent::NextParameter,
                        "p" | "prev" => InputEvent::PrevParameter,
                        "q" | "esc" => InputEvent::Cancel,
                        "v" | "paste" => match clipboard.read() {
                            Ok(text) => InputEvent::Paste(text.trim().to_string()),
                            Err(e) => {
                                writeln!(output, "Clipboard unavailable: {e}")?;
                                continue;
                            }
                        },
                        value => InputEvent::Edit(value.to_string()),
                    };

                    match session.apply(event) {
                        Ok(Effect::Execute { command }) => {
                            return Ok(CustomizeFlow::Execute(command));
                        }
                        Ok(_) => {}
                        Err(SessionError::Incomplete(incomplete)) => {
                            writeln!(
                                output,
                                "⚠️  Fill in these placeholders first: {}",
                                incomplete.placeholders.join(", ")
                            )?;
                        }
                        Err(e) => writeln!(output, "{e}")?,
                    }
                }
                SessionState::ConfirmingExecution => {
                    let verdict = session
                        .verdict()
                        .cloned()
                        .ok_or_else(|| anyhow!("confirming without a verdict"))?;
                    let accepted = self.confirm_dangerous_with_io(&verdict, input, output)?;
                    let event = if accepted { InputEvent::Confirm } else { InputEvent::Decline };
                    if let Ok(Effect::Execute { command }) = session.apply(event) {
                        return Ok(CustomizeFlow::Execute(command));
                    }
                }
                SessionState::Cancelled => return Ok(CustomizeFlow::Cancelled),
                other => {
                    return Err(anyhow!("session in unexpected state {other:?} during customization"));
                }
            }
        }
    }

    fn render_customization<W: Write>(
        &self,
        session: &InteractiveSession,
        output: &mut W,
    ) -> Result<()> {
        let Some(customization) = session.customization() else {
            return Ok(());
        };

        writeln!(output)?;
        write!(output, "❯ ")?;
        for (i, span) in customization.spans().iter().enumerate() {
            let value = customization.value_of(i);
            if span.is_parameter() {
                if Some(i) == customization.active_index() {
                    write!(output, "«{value}»")?;
                } else {
                    write!(output, "⟨{value}⟩")?;
                }
            } else {
                write!(output, "{value}")?;
            }
        }
        writeln!(output)?;
        writeln!(
            output,
            "  tab next · p prev · v paste · type to edit · Enter run · q back"
        )?;
        write!(output, "> ")?;
        output.flush()?;
        Ok(())
    }

    /// Shows the dangerous-command banner and collects an explicit answer.
    ///
    /// Only a literal `yes`/`y` counts as acknowledgment; `no`, an empty
    /// line, or end of input declines.
    pub fn confirm_dangerous_with_io<R: BufRead, W: Write>(
        &self,
        verdict: &RiskVerdict,
        input: &mut R,
        output: &mut W,
    ) -> Result<bool> {
        writeln!(output, "\n{}", "=".repeat(60))?;
        writeln!(output, "⚠️  DANGEROUS COMMAND")?;
        writeln!(output, "{}", "=".repeat(60))?;
        if let Some(reason) = &verdict.reason {
            writeln!(output, "Reason: {reason}")?;
        }
        writeln!(output, "This command can cause irreversible damage.")?;

        loop {
            write!(output, "\nRun it anyway? (yes/no): ")?;
            output.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                info!("Confirmation aborted at end of input");
                return Ok(false);
            }
            match line.trim().to_lowercase().as_str() {
                "yes" | "y" => {
                    warn!("User confirmed dangerous command");
                    return Ok(true);
                }
                "no" | "n" | "" => {
                    info!("User declined dangerous command");
                    return Ok(false);
                }
                _ => writeln!(output, "Please answer 'yes' or 'no'.")?,
            }
        }
    }

    /// Prints an execution outcome: captured output, then a status line.
    pub fn show_outcome_with_io<W: Write>(
        &self,
        outcome: &ExecutionOutcome,
        output: &mut W,
    ) -> Result<()> {
        if !outcome.stdout.is_empty() {
            write!(output, "{}", outcome.stdout)?;
        }
        if !outcome.stderr.is_empty() {
            write!(output, "{}", outcome.stderr)?;
        }

        if outcome.timed_out {
            writeln!(output, "✗ Command timed out after {:.1}s", outcome.duration.as_secs_f64())?;
        } else if outcome.success() {
            if self.verbose {
                writeln!(output, "✓ Command executed successfully ({:.2}s)", outcome.duration.as_secs_f64())?;
            }
        } else {
            writeln!(output, "✗ Command failed with exit code {}", outcome.exit_code.unwrap_or(-1))?;
        }
        Ok(())
    }

    /// Prints the summary for a multi-command run.
    pub fn show_summary_with_io<W: Write>(
        &self,
        results: &[(String, bool)],
        output: &mut W,
    ) -> Result<()> {
        if results.len() < 2 {
            return Ok(());
        }
        let successful = results.iter().filter(|(_, ok)| *ok).count();
        writeln!(output, "\nExecution summary:")?;
        writeln!(output, "  ✓ Successful: {successful}")?;
        writeln!(output, "  ✗ Failed/skipped: {}", results.len() - successful)?;
        for (command, _) in results.iter().filter(|(_, ok)| !ok) {
            writeln!(output, "    • {command}")?;
        }
        Ok(())
    }

    // =========================================================================
    // Convenience methods using standard I/O
    // =========================================================================

    pub fn display_candidates(&self, candidates: &[Candidate]) -> Result<()> {
        self.display_candidates_with_io(candidates, &mut io::stdout())
    }

    pub fn prompt_select(&self, count: usize) -> Result<SelectAction> {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        self.prompt_select_with_io(count, &mut input, &mut io::stdout())
    }

    pub fn customize(
        &self,
        session: &mut InteractiveSession,
        clipboard: &dyn Clipboard,
    ) -> Result<CustomizeFlow> {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        self.customize_with_io(session, clipboard, &mut input, &mut io::stdout())
    }

    pub fn show_outcome(&self, outcome: &ExecutionOutcome) -> Result<()> {
        self.show_outcome_with_io(outcome, &mut io::stdout())
    }

    pub fn show_summary(&self, results: &[(String, bool)]) -> Result<()> {
        self.show_summary_with_io(results, &mut io::stdout())
    }
}

/// Marks parameter spans in a command for display.
fn highlight_parameters(command: &str) -> String {
    crate::parameters::detect(command)
        .iter()
        .map(|span| {
            if span.is_parameter() {
                format!("⟨{}⟩", span.text)
            } else {
                span.text.clone()
            }
        })
        .collect()
}
