use crate::backend::ToolBox;
use crate::error::TaskError;
use crate::prompt;
use crate::schema::{SlideGeneration, SlidesInput, SlidesOutput, TaskInput};

use super::FlowContext;

/// Turn document text into an ordered list of slides.
pub async fn generate_slides(
    ctx: &FlowContext,
    input: SlidesInput,
) -> Result<SlidesOutput, TaskError> {
    input.validate(&ctx.limits)?;

    let prompt = prompt::slides(&input);
    let output = ctx
        .client
        .generate::<SlideGeneration>(prompt, ToolBox::none())
        .await?;

    tracing::info!(slides = output.slides.len(), "slides generated");
    Ok(output)
}
