use crate::backend::ToolBox;
use crate::error::TaskError;
use crate::prompt;
use crate::schema::{PresentationTips, TaskInput, TipsInput, TipsOutput};

use super::FlowContext;

/// Answer a single presentation-advice question. No memory between calls.
pub async fn presentation_tips(
    ctx: &FlowContext,
    input: TipsInput,
) -> Result<TipsOutput, TaskError> {
    input.validate(&ctx.limits)?;
    ctx.client
        .generate::<PresentationTips>(prompt::presentation_tips(&input), ToolBox::none())
        .await
}
