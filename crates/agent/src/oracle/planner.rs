//! Planning oracle: task text in, ordered plan of independent steps out.

use super::OracleClient;
use opsassist_core::error::OracleError;
use opsassist_core::plan::{ActionCategory, Step, StepId};
use opsassist_core::provider::ToolDefinition;
use opsassist_core::tool::ToolRegistry;
use opsassist_core::usage::CallerCategory;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{info, warn};

const SYSTEM_PROMPT: &str = "You are a Planner Agent. Convert the user task into a JSON plan. \
Each step must include: step_id, action, category, tool (if any), input. \
Steps must be independent of each other; never make one step consume another step's output. \
Return ONLY raw JSON array. No markdown. No explanation.";

/// Tool ids older planner prompts used, mapped to the registered names.
const TOOL_ALIASES: &[(&str, &str)] = &[("weather_api", "weather_lookup"), ("github_api", "github_search")];

pub struct Planner {
    client: OracleClient,
    tools: Vec<ToolDefinition>,
}

impl Planner {
    pub fn new(client: OracleClient, tools: &ToolRegistry) -> Self {
        Self {
            client,
            tools: tools.definitions(),
        }
    }

    /// Ask the model for a plan and parse it. A bad response is not retried.
    pub async fn plan(&self, task: &str) -> Result<Vec<Step>, OracleError> {
        let response = self
            .client
            .ask(SYSTEM_PROMPT, &self.user_prompt(task), CallerCategory::Planner)
            .await?;

        let steps = parse_plan(&response)?;
        info!(steps = steps.len(), "Plan created");
        Ok(steps)
    }

    fn user_prompt(&self, task: &str) -> String {
        let mut prompt = format!("User Task: {task}\n\nAvailable tools:\n");
        if self.tools.is_empty() {
            prompt.push_str("- none\n");
        }
        for tool in &self.tools {
            prompt.push_str(&format!("- {}: {}\n", tool.name, tool.description));
        }
        prompt.push_str(
            "\nCategories: repo_search (tool github_search), weather_lookup (tool weather_lookup), \
general (no tool, or any other tool).\n\nExample:\n\
[{\"step_id\": 1, \"action\": \"Search GitHub repositories\", \"category\": \"repo_search\", \
\"tool\": \"github_search\", \"input\": \"ai agents\"}]",
        );
        prompt
    }
}

#[derive(Deserialize)]
struct RawStep {
    step_id: StepId,
    #[serde(default)]
    action: String,
    #[serde(default)]
    category: Option<Value>,
    #[serde(default)]
    tool: Option<String>,
    #[serde(default)]
    input: Value,
}

/// Parse a planner response into steps.
///
/// Tolerates markdown fences and prose around the JSON array. Step ids must
/// be unique original ids.
pub fn parse_plan(text: &str) -> Result<Vec<Step>, OracleError> {
    let json = extract_array(text).ok_or_else(|| OracleError::Unparseable {
        reason: "no JSON array in planner response".into(),
    })?;

    let raw: Vec<RawStep> = serde_json::from_str(json).map_err(|e| OracleError::Unparseable {
        reason: e.to_string(),
    })?;

    let mut seen = HashSet::new();
    let mut steps = Vec::with_capacity(raw.len());
    for raw_step in raw {
        if raw_step.step_id.is_retry() {
            return Err(OracleError::InvalidPlan(format!(
                "planner produced a retry step id: {}",
                raw_step.step_id
            )));
        }
        if !seen.insert(raw_step.step_id) {
            return Err(OracleError::InvalidPlan(format!(
                "duplicate step id: {}",
                raw_step.step_id
            )));
        }
        steps.push(into_step(raw_step));
    }
    Ok(steps)
}

fn into_step(raw: RawStep) -> Step {
    let tool = raw.tool.map(|t| t.trim().to_string()).and_then(normalize_tool);

    let category = match raw.category {
        Some(Value::Null) | None => ActionCategory::from_tool(tool.as_deref()),
        Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|_| {
            warn!(step_id = %raw.step_id, category = %value, "Unknown step category, inferring from tool");
            ActionCategory::from_tool(tool.as_deref())
        }),
    };

    Step {
        id: raw.step_id,
        action: raw.action,
        category,
        tool,
        input: raw.input,
    }
}

fn normalize_tool(tool: String) -> Option<String> {
    if tool.is_empty() || tool.eq_ignore_ascii_case("none") || tool.eq_ignore_ascii_case("null") {
        return None;
    }
    let tool = TOOL_ALIASES
        .iter()
        .find(|(alias, _)| *alias == tool)
        .map(|(_, name)| name.to_string())
        .unwrap_or(tool);
    Some(tool)
}

fn extract_array(text: &str) -> Option<&str> {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text).trim();

    // Prose may contain brackets of its own; take the first span that is an
    // array of step records.
    for (start, _) in text.match_indices('[') {
        let mut values = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        if let Some(Ok(Value::Array(items))) = values.next() {
            if items.iter().all(Value::is_object) {
                return Some(&text[start..start + values.byte_offset()]);
            }
        }
    }

    // Nothing parsed; hand back the widest span so the error names the problem.
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{MockTool, RecordingSink, ScriptedProvider, registry};
    use opsassist_core::tool::Tool;
    use serde_json::json;
    use std::sync::Arc;

    const TWO_STEP_PLAN: &str = r#"[
        {"step_id": 1, "action": "Search GitHub repositories", "category": "repo_search", "tool": "github_search", "input": "ai agents"},
        {"step_id": 2, "action": "Get weather", "tool": "weather_lookup", "input": "Tokyo"}
    ]"#;

    #[test]
    fn parses_plain_array() {
        let steps = parse_plan(TWO_STEP_PLAN).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].id, StepId::Original(1));
        assert_eq!(steps[0].category, ActionCategory::RepoSearch);
        assert_eq!(steps[1].category, ActionCategory::WeatherLookup);
        assert_eq!(steps[1].input, json!("Tokyo"));
    }

    #[test]
    fn strips_markdown_fences_and_prose() {
        let fenced = format!("```json\n{TWO_STEP_PLAN}\n```");
        assert_eq!(parse_plan(&fenced).unwrap().len(), 2);

        let chatty = format!("Here is the plan:\n{TWO_STEP_PLAN}\nGood luck!");
        assert_eq!(parse_plan(&chatty).unwrap().len(), 2);
    }

    #[test]
    fn bracketed_prose_before_the_plan_is_skipped() {
        let chatty = format!("Here [v2] is the plan: {TWO_STEP_PLAN} (see [1] for details)");
        let steps = parse_plan(&chatty).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].id, StepId::Original(1));

        let numbered = format!("Options [1, 2] considered.\n```json\n{TWO_STEP_PLAN}\n```");
        assert_eq!(parse_plan(&numbered).unwrap().len(), 2);
    }

    #[test]
    fn none_tool_means_no_tool() {
        let steps = parse_plan(r#"[{"step_id": 1, "action": "Summarize", "tool": "none", "input": ""}]"#).unwrap();
        assert_eq!(steps[0].tool, None);
        assert_eq!(steps[0].category, ActionCategory::General);
    }

    #[test]
    fn legacy_weather_tool_is_aliased() {
        let steps = parse_plan(r#"[{"step_id": 1, "action": "Weather", "tool": "weather_api", "input": "Paris"}]"#).unwrap();
        assert_eq!(steps[0].tool.as_deref(), Some("weather_lookup"));
        assert_eq!(steps[0].category, ActionCategory::WeatherLookup);
    }

    #[test]
    fn explicit_category_wins_over_tool() {
        let steps = parse_plan(
            r#"[{"step_id": 1, "action": "Find repos", "category": "search", "tool": "code_index", "input": "x"}]"#,
        )
        .unwrap();
        assert_eq!(steps[0].category, ActionCategory::RepoSearch);
    }

    #[test]
    fn unknown_category_falls_back_to_tool() {
        let steps = parse_plan(
            r#"[{"step_id": 1, "action": "x", "category": "astrology", "tool": "github_search"}]"#,
        )
        .unwrap();
        assert_eq!(steps[0].category, ActionCategory::RepoSearch);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = parse_plan(r#"[{"step_id": 1, "action": "a"}, {"step_id": 1, "action": "b"}]"#).unwrap_err();
        assert!(matches!(err, OracleError::InvalidPlan(_)));
    }

    #[test]
    fn retry_ids_are_rejected() {
        let err = parse_plan(r#"[{"step_id": "retry_1", "action": "a"}]"#).unwrap_err();
        assert!(matches!(err, OracleError::InvalidPlan(_)));
    }

    #[test]
    fn garbage_is_unparseable() {
        assert!(matches!(parse_plan("I cannot help"), Err(OracleError::Unparseable { .. })));
        assert!(matches!(parse_plan("[not json]"), Err(OracleError::Unparseable { .. })));
    }

    #[test]
    fn empty_plan_is_allowed() {
        assert!(parse_plan("[]").unwrap().is_empty());
    }

    #[tokio::test]
    async fn plan_prompts_with_registered_tools() {
        let provider = Arc::new(ScriptedProvider::texts(&[TWO_STEP_PLAN]));
        let sink = Arc::new(RecordingSink::default());
        let client = OracleClient::new(provider.clone(), "gemini-2.5-flash").with_usage(sink.clone());
        let tools = registry(vec![
            Arc::new(MockTool::new("github_search", json!([]))) as Arc<dyn Tool>,
            Arc::new(MockTool::new("weather_lookup", json!({}))),
        ]);
        let planner = Planner::new(client, &tools);

        let steps = planner.plan("find repos and the weather in Tokyo").await.unwrap();
        assert_eq!(steps.len(), 2);

        let request = &provider.requests()[0];
        assert!(request.messages[0].content.starts_with("You are a Planner Agent"));
        let user = &request.messages[1].content;
        assert!(user.starts_with("User Task: find repos and the weather in Tokyo"));
        assert!(user.contains("- github_search: Mock tool"));
        assert!(user.contains("- weather_lookup: Mock tool"));
        assert_eq!(sink.calls()[0].1, CallerCategory::Planner);
    }
}
