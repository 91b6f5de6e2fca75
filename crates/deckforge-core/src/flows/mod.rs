//! Task orchestrators ("flows").
//!
//! Each flow is a stateless async function: validate the input, build the
//! prompt, call the generation client, return the validated output. Errors
//! propagate unchanged as [`TaskError`](crate::error::TaskError); only the
//! action layer turns them into user-facing messages.

pub mod faq;
pub mod image;
pub mod research;
pub mod slides;
pub mod tips;

use std::sync::Arc;

use crate::backend::GenerationClient;
use crate::config::Limits;
use crate::search::SearchProvider;

pub use faq::answer_question;
pub use image::generate_image;
pub use research::web_research;
pub use slides::generate_slides;
pub use tips::presentation_tips;

/// Shared, immutable collaborators for every flow.
#[derive(Clone)]
pub struct FlowContext {
    pub client: GenerationClient,
    pub search: Arc<dyn SearchProvider>,
    pub limits: Limits,
}

impl FlowContext {
    pub fn new(client: GenerationClient, search: Arc<dyn SearchProvider>, limits: Limits) -> Self {
        Self {
            client,
            search,
            limits,
        }
    }
}

impl std::fmt::Debug for FlowContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowContext")
            .field("client", &self.client)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}
