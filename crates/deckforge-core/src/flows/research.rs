use crate::backend::ToolBox;
use crate::error::TaskError;
use crate::prompt;
use crate::schema::{ResearchInput, ResearchOutput, TaskInput, WebResearch};
use crate::search::SearchTool;

use super::FlowContext;

/// Gather data and statistics on a topic.
///
/// The model gets a `search_web` tool backed by the context's search
/// provider and decides itself whether and how often to call it, up to
/// `max_tool_calls`.
pub async fn web_research(
    ctx: &FlowContext,
    input: ResearchInput,
) -> Result<ResearchOutput, TaskError> {
    input.validate(&ctx.limits)?;

    let max = ctx.limits.max_tool_calls;
    let tools = ToolBox::new(max).with_tool(SearchTool::new(ctx.search.clone()));
    ctx.client
        .generate::<WebResearch>(prompt::web_research(&input, max), tools)
        .await
}
