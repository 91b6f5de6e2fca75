//! Generation backend seam.
//!
//! This module defines the [`GenerationBackend`] trait that every model
//! provider adapter implements, the [`GenerationClient`] that wraps it with
//! a timeout and output validation, and the [`ToolBox`] through which a
//! backend lets the model call back into the application.
//!
//! # Architecture
//!
//! ```text
//! flow
//!   |
//!   v
//! GenerationClient --timeout--> &dyn GenerationBackend --HTTP--> model API
//!   |                                   |
//!   | validate::<TaskDefinition>        | ToolBox::invoke(name, args)
//!   v                                   v
//! TaskOutput                       Tool (e.g. search_web), bounded
//! ```

pub mod client;
pub mod gemini;
pub mod tools;
pub mod trait_def;

pub use client::{GenerationClient, validate_output};
pub use gemini::GeminiBackend;
pub use tools::{Tool, ToolBox, ToolSpec};
pub use trait_def::{GeneratedMedia, GenerationBackend, GenerationRequest};
