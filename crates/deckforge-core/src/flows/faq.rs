use crate::backend::ToolBox;
use crate::error::TaskError;
use crate::prompt;
use crate::schema::{FaqAnswering, FaqInput, FaqOutput, TaskInput};

use super::FlowContext;

/// Answer a question about the product, using optional context data and
/// the user's earlier turns.
///
/// Only the `max_faq_history` most recent turns reach the prompt.
pub async fn answer_question(ctx: &FlowContext, input: FaqInput) -> Result<FaqOutput, TaskError> {
    input.validate(&ctx.limits)?;

    let turns = input.previous_queries.as_ref().map_or(0, Vec::len);
    let max = ctx.limits.max_faq_history;
    if turns > max {
        tracing::debug!(turns, kept = max, "truncating FAQ history");
    }

    ctx.client
        .generate::<FaqAnswering>(prompt::answer_question(&input, max), ToolBox::none())
        .await
}
