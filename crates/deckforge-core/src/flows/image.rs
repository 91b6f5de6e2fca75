use crate::error::TaskError;
use crate::prompt;
use crate::schema::{ImageGeneration, ImageInput, ImageOutput, TaskDefinition, TaskInput, TaskOutput};

use super::FlowContext;

/// Generate an image and return it as a data URI.
pub async fn generate_image(ctx: &FlowContext, input: ImageInput) -> Result<ImageOutput, TaskError> {
    input.validate(&ctx.limits)?;

    let media = ctx.client.generate_image(&prompt::image(&input.prompt)).await?;
    let Some(url) = media.and_then(|m| m.url) else {
        return Err(TaskError::GenerationFailure(
            "Failed to generate image.".to_string(),
        ));
    };

    let output = ImageOutput {
        image_data_uri: url,
    };
    output
        .validate()
        .map_err(|detail| TaskError::schema(ImageGeneration::NAME, detail))?;
    Ok(output)
}
