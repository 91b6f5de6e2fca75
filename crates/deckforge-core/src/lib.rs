//! deckforge core: typed generation tasks behind an error boundary.
//!
//! Layers, bottom-up:
//! - [`schema`]: per-task input/output contracts and validation
//! - [`prompt`]: prompt templates with delimited input sections
//! - [`backend`]: the generation client, tool calling, and the Gemini adapter
//! - [`flows`]: one orchestrator per task
//! - [`action`]: the server-action boundary that turns errors into messages

pub mod action;
pub mod backend;
pub mod config;
pub mod error;
pub mod flows;
pub mod ingest;
pub mod prompt;
pub mod schema;
pub mod search;

pub use action::{Action, ActionFailure, ActionResponse, ActionResult, Actions};
pub use config::{BackendConfig, Limits};
pub use error::{ErrorKind, FieldError, TaskError, ValidationError};
pub use flows::FlowContext;
