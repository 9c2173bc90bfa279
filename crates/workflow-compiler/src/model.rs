use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lens_types::{NodeRef, Role};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Click,
    Type,
    Select,
    Press,
    Hover,
    Scroll,
    Navigate,
    Wait,
}

/// Selector strategies, most stable first. The string form uses a small
/// engine-agnostic prefix DSL (`testid=`, `role=`, `label=`, `placeholder=`,
/// `text=`, `css=`) that the action driver interprets.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorStrategy {
    TestId,
    RoleName,
    Label,
    Placeholder,
    Text,
    Css,
}

/// The element an action targeted, with every selector we could derive for
/// finding it again, in priority order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ElementTarget {
    #[serde(rename = "ref")]
    pub ref_id: NodeRef,
    pub role: Role,
    pub name: String,
    pub selectors: Vec<(SelectorStrategy, String)>,
}

/// One recorded agent action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordedAction {
    pub action: ActionKind,
    /// Absent for navigate and wait.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub target: Option<ElementTarget>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub value: Option<String>,
    pub url_before: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub url_after: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTrace {
    pub task: String,
    pub site_domain: String,
    pub steps: Vec<RecordedAction>,
    pub success: bool,
    pub recorded_at: DateTime<Utc>,
}

/// A value slot substituted at execution time. Step values reference it as
/// `{name}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterSlot {
    pub name: String,
    pub step_indices: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub default_value: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub index: usize,
    pub action: ActionKind,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub target: Option<ElementTarget>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub value: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompiledWorkflow {
    pub workflow_id: String,
    pub task: String,
    pub task_fingerprint: String,
    pub site_domain: String,
    pub steps: Vec<WorkflowStep>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub parameter_slots: Vec<ParameterSlot>,
    pub compiled_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub index: usize,
    pub action: ActionKind,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    pub healed: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub heal_level: Option<u8>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub workflow_id: String,
    pub success: bool,
    pub steps_executed: usize,
    pub steps_succeeded: usize,
    pub step_results: Vec<StepResult>,
}

/// Lowercase, strip punctuation, collapse whitespace.
pub fn normalize_task(description: &str) -> String {
    let lowered = description.to_lowercase();
    let stripped: String = lowered
        .chars()
        .map(|c| if c.is_ascii_punctuation() { ' ' } else { c })
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Stable fingerprint of a normalized task description.
pub fn task_fingerprint(description: &str) -> String {
    let hex = blake3::hash(normalize_task(description).as_bytes()).to_hex();
    format!("wf_{}", &hex[..16])
}
