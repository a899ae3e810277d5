//! Output schema validation for successful step results.
//!
//! Validation only reports; it never changes a result's status.

use opsassist_core::plan::{ActionCategory, ExecutionResult, StepId};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "field", rename_all = "snake_case")]
pub enum IssueKind {
    /// A required field is absent from a record.
    MissingField(String),
    /// The output is not shaped like a record (or list of records).
    NotARecord,
}

/// One schema violation found in a successful result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaIssue {
    pub step_id: StepId,
    pub category: ActionCategory,
    /// Index of the offending record within a list output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<usize>,
    #[serde(flatten)]
    pub kind: IssueKind,
}

impl SchemaIssue {
    /// The missing field, if this is a missing-field issue.
    pub fn field(&self) -> Option<&str> {
        match &self.kind {
            IssueKind::MissingField(field) => Some(field),
            IssueKind::NotARecord => None,
        }
    }
}

impl fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {} ({})", self.step_id, self.category)?;
        if let Some(item) = self.item {
            write!(f, " item {}", item + 1)?;
        }
        match &self.kind {
            IssueKind::MissingField(field) => write!(f, " missing field '{field}'"),
            IssueKind::NotARecord => write!(f, " output is not a record"),
        }
    }
}

/// Check every successful result against its category's required fields.
///
/// Failed results and `general` steps are skipped. A field counts as
/// present when its key exists, even with a null value.
pub fn validate(results: &[ExecutionResult]) -> Vec<SchemaIssue> {
    let mut issues = Vec::new();

    for result in results {
        let Some(output) = result.output() else {
            continue;
        };
        let required = result.category.required_fields();
        if required.is_empty() {
            continue;
        }

        let issue = |item: Option<usize>, kind: IssueKind| SchemaIssue {
            step_id: result.step_id,
            category: result.category,
            item,
            kind,
        };

        match output {
            Value::Array(items) if result.category.expects_list() => {
                for (i, item) in items.iter().enumerate() {
                    check_record(item, required, Some(i), &issue, &mut issues);
                }
            }
            Value::Object(_) => check_record(output, required, None, &issue, &mut issues),
            _ => issues.push(issue(None, IssueKind::NotARecord)),
        }
    }

    issues
}

fn check_record(
    record: &Value,
    required: &[&str],
    item: Option<usize>,
    issue: &dyn Fn(Option<usize>, IssueKind) -> SchemaIssue,
    issues: &mut Vec<SchemaIssue>,
) {
    let Some(map) = record.as_object() else {
        issues.push(issue(item, IssueKind::NotARecord));
        return;
    };
    for field in required {
        if !map.contains_key(*field) {
            issues.push(issue(item, IssueKind::MissingField(field.to_string())));
        }
    }
}
