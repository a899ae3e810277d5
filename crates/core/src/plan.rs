//! Plan domain types: steps, their identifiers, and execution results.
//!
//! A plan is an ordered `Vec<Step>` produced by the planning oracle. Each
//! step is executed exactly once by the step executor and yields exactly one
//! [`ExecutionResult`]. The repair loop may synthesize retry steps whose ids
//! are derived from the original step they stand in for.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

const RETRY_PREFIX: &str = "retry_";

/// Identifier of a step within a plan.
///
/// Original steps carry the integer assigned by the planner. Retry steps
/// synthesized by the repair loop carry the id of the step they retry,
/// marked so they can never be confused with an original.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepId {
    /// A step as produced by the planner.
    Original(u32),
    /// A corrective retry of the original step with this number.
    Retry(u32),
}

impl StepId {
    /// The original step number, with any retry marker stripped.
    pub fn original(&self) -> u32 {
        match self {
            Self::Original(n) | Self::Retry(n) => *n,
        }
    }

    /// Whether this id marks a retry step.
    pub fn is_retry(&self) -> bool {
        matches!(self, Self::Retry(_))
    }

    /// The retry id derived from this step.
    pub fn as_retry(&self) -> Self {
        Self::Retry(self.original())
    }
}

impl Ord for StepId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.original()
            .cmp(&other.original())
            .then_with(|| self.is_retry().cmp(&other.is_retry()))
    }
}

impl PartialOrd for StepId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Original(n) => write!(f, "{n}"),
            Self::Retry(n) => write!(f, "{RETRY_PREFIX}{n}"),
        }
    }
}

/// Error returned when a string is not a valid step id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid step id: {0:?}")]
pub struct InvalidStepId(pub String);

impl FromStr for StepId {
    type Err = InvalidStepId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (digits, retry) = match s.strip_prefix(RETRY_PREFIX) {
            Some(rest) => (rest, true),
            None => (s, false),
        };
        let n: u32 = digits.parse().map_err(|_| InvalidStepId(s.to_string()))?;
        Ok(if retry { Self::Retry(n) } else { Self::Original(n) })
    }
}

impl Serialize for StepId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Original(n) => serializer.serialize_u32(*n),
            Self::Retry(_) => serializer.collect_str(self),
        }
    }
}

impl<'de> Deserialize<'de> for StepId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u32),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(Self::Original(n)),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// The kind of work a step performs.
///
/// Attached by the planning oracle when it builds the plan. The category
/// decides which output schema a successful result must satisfy and which
/// fallback input the repair loop uses when the step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    /// Searching a code host for repositories.
    #[serde(alias = "search")]
    RepoSearch,
    /// Looking up current weather for a city.
    #[serde(alias = "lookup", alias = "weather")]
    WeatherLookup,
    /// Anything else; no output schema, no fallback.
    #[default]
    General,
}

impl ActionCategory {
    /// Infer a category from a tool identifier when the planner gave none.
    pub fn from_tool(tool: Option<&str>) -> Self {
        match tool {
            Some("github_search") => Self::RepoSearch,
            Some("weather_lookup") => Self::WeatherLookup,
            _ => Self::General,
        }
    }

    /// Fields every successful output record of this category must carry.
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            Self::RepoSearch => &["name", "stars", "description"],
            Self::WeatherLookup => &["city", "temp_c", "condition"],
            Self::General => &[],
        }
    }

    /// Conservative input used when retrying a failed step of this category.
    pub fn fallback_input(&self) -> Option<serde_json::Value> {
        match self {
            Self::RepoSearch => Some(serde_json::Value::String("ai agents".into())),
            Self::WeatherLookup => Some(serde_json::Value::String("London".into())),
            Self::General => None,
        }
    }

    /// The tool that serves this category.
    pub fn default_tool(&self) -> Option<&'static str> {
        match self {
            Self::RepoSearch => Some("github_search"),
            Self::WeatherLookup => Some("weather_lookup"),
            Self::General => None,
        }
    }

    /// Whether successful outputs are expected to be a list of records.
    pub fn expects_list(&self) -> bool {
        matches!(self, Self::RepoSearch)
    }
}

impl fmt::Display for ActionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RepoSearch => write!(f, "repo_search"),
            Self::WeatherLookup => write!(f, "weather_lookup"),
            Self::General => write!(f, "general"),
        }
    }
}

/// One unit of work in a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Unique (within the plan) and stable ordering key
    #[serde(rename = "step_id")]
    pub id: StepId,

    /// Human-readable action label
    pub action: String,

    /// Action category tag
    #[serde(default)]
    pub category: ActionCategory,

    /// Tool to invoke, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,

    /// Opaque tool input
    #[serde(default)]
    pub input: serde_json::Value,
}

impl Step {
    /// Create an original step with no tool and a null input.
    pub fn new(id: u32, action: impl Into<String>) -> Self {
        Self {
            id: StepId::Original(id),
            action: action.into(),
            category: ActionCategory::General,
            tool: None,
            input: serde_json::Value::Null,
        }
    }

    /// Set the tool; the category is inferred from it unless set explicitly later.
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        let tool = tool.into();
        self.category = ActionCategory::from_tool(Some(&tool));
        self.tool = Some(tool);
        self
    }

    /// Set the category explicitly.
    pub fn with_category(mut self, category: ActionCategory) -> Self {
        self.category = category;
        self
    }

    /// Set the input payload.
    pub fn with_input(mut self, input: impl Into<serde_json::Value>) -> Self {
        self.input = input.into();
        self
    }
}

/// Terminal status of one executed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    /// The tool (or no-op) produced an output.
    Success { output: serde_json::Value },
    /// The tool failed after exhausting its retry policy.
    Failed { error: String },
}

/// The outcome of executing one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// The step this result is for
    pub step_id: StepId,

    /// The step's action label
    pub action: String,

    /// The step's action category
    #[serde(default)]
    pub category: ActionCategory,

    /// Success output or failure description
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

impl ExecutionResult {
    /// A successful result for `step`.
    pub fn success(step: &Step, output: serde_json::Value) -> Self {
        Self {
            step_id: step.id,
            action: step.action.clone(),
            category: step.category,
            outcome: StepOutcome::Success { output },
        }
    }

    /// A failed result for `step`.
    pub fn failed(step: &Step, error: impl Into<String>) -> Self {
        Self {
            step_id: step.id,
            action: step.action.clone(),
            category: step.category,
            outcome: StepOutcome::Failed {
                error: error.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, StepOutcome::Success { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, StepOutcome::Failed { .. })
    }

    /// The output payload, if the step succeeded.
    pub fn output(&self) -> Option<&serde_json::Value> {
        match &self.outcome {
            StepOutcome::Success { output } => Some(output),
            StepOutcome::Failed { .. } => None,
        }
    }

    /// The error description, if the step failed.
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            StepOutcome::Success { .. } => None,
            StepOutcome::Failed { error } => Some(error),
        }
    }
}
