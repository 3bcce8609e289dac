//! Quomodo - natural-language task to safely executed shell command.
//!
//! This library turns a plain-language request into one or more candidate
//! shell commands, lets the user inspect and customize the parts that were
//! meant to be customized, and runs the result with bounded risk:
//!
//! - **Candidate generation** via an LLM provider, behind a content-addressed
//!   response cache with TTL expiry
//! - **Parameter detection**: a lexical pass that finds the "holes" in a
//!   command (file paths, placeholders, flag values, time codes)
//! - **Interactive customization**: a pure, event-driven state machine for
//!   tabbing through parameters, editing them, and committing
//! - **Safety gating**: a rule-based classifier that demands explicit
//!   confirmation before dangerous commands run
//! - **Bounded execution**: subprocesses run with a timeout and are killed,
//!   process group and all, when they overrun it
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management (API keys, policies, timeouts)
//! - [`cache`] - Fingerprinted response cache with TTL expiry
//! - [`parameters`] - Span detection over command text
//! - [`safety`] - Risk classification of commands
//! - [`llm_client`] - Provider client and response parsing
//! - [`orchestrator`] - Cache-checked candidate generation
//! - [`session`] - The interactive customization state machine
//! - [`executor`] - Safety-gated process execution with timeouts
//! - [`history`] - Append-only execution history
//! - [`router`] - Ties the pipeline together for one CLI invocation
//! - [`ui`] - Console prompts with injectable I/O
//! - [`providers`] - Shared dependency injection traits
//! - [`http_client`] - HTTP client abstraction
//! - [`error`] - Error taxonomy
//!
//! # Example
//!
//! ```ignore
//! use quomodo::config::Config;
//! use quomodo::router::Router;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let router = Router::new(config, false)?;
//!     router.process_query("install nodejs on ubuntu", None, false).await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod executor;
pub mod history;
pub mod http_client;
pub mod llm_client;
pub mod orchestrator;
pub mod parameters;
pub mod providers;
pub mod router;
pub mod safety;
pub mod session;
pub mod ui;
