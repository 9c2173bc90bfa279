//! Workflow replay with selector healing.

use std::collections::HashMap;

use async_trait::async_trait;
use lens_types::StateTree;
use tracing::{debug, warn};

use crate::errors::{Result, WorkflowError};
use crate::healer;
use crate::model::{
    ActionKind, CompiledWorkflow, ExecutionResult, StepResult, WorkflowStep,
};

/// Side-effecting page actions, addressed by selector strings in the
/// prefix DSL produced by the selector builder.
#[async_trait]
pub trait ActionDriver: Send + Sync {
    async fn click(&self, selector: &str) -> Result<()>;
    async fn type_text(&self, selector: &str, text: &str) -> Result<()>;
    async fn select_option(&self, selector: &str, value: &str) -> Result<()>;
    async fn press(&self, key: &str) -> Result<()>;
    async fn hover(&self, selector: &str) -> Result<()>;
    async fn scroll(&self, dx: f64, dy: f64) -> Result<()>;
    async fn navigate(&self, url: &str) -> Result<()>;
    async fn wait_ms(&self, ms: u64) -> Result<()>;
}

pub struct WorkflowExecutor;

impl WorkflowExecutor {
    /// Replay a compiled workflow.
    ///
    /// `params` fills parameter slots. `heal_tree` is the most recent
    /// observed state tree; when provided, targets whose selectors all
    /// fail are re-resolved against it before the step is declared dead.
    /// Execution stops at the first failed step.
    pub async fn execute(
        workflow: &CompiledWorkflow,
        driver: &dyn ActionDriver,
        params: &HashMap<String, String>,
        heal_tree: Option<&StateTree>,
    ) -> ExecutionResult {
        let mut step_results = Vec::new();
        let mut succeeded = 0usize;

        for step in &workflow.steps {
            let value = resolve_value(workflow, step, params);
            let result = Self::run_step(step, value.as_deref(), driver, heal_tree).await;
            let ok = result.success;
            step_results.push(result);
            if ok {
                succeeded += 1;
            } else {
                warn!(
                    workflow = %workflow.workflow_id,
                    step = step.index,
                    "workflow step failed; aborting replay"
                );
                break;
            }
        }

        ExecutionResult {
            workflow_id: workflow.workflow_id.clone(),
            success: succeeded == workflow.steps.len(),
            steps_executed: step_results.len(),
            steps_succeeded: succeeded,
            step_results,
        }
    }

    async fn run_step(
        step: &WorkflowStep,
        value: Option<&str>,
        driver: &dyn ActionDriver,
        heal_tree: Option<&StateTree>,
    ) -> StepResult {
        // Targetless actions run directly.
        let Some(target) = &step.target else {
            let outcome = match step.action {
                ActionKind::Navigate => match value {
                    Some(url) => driver.navigate(url).await,
                    None => Err(WorkflowError::ActionFailed("navigate without url".into())),
                },
                ActionKind::Wait => {
                    let ms = value.and_then(|v| v.parse().ok()).unwrap_or(500);
                    driver.wait_ms(ms).await
                }
                ActionKind::Press => match value {
                    Some(key) => driver.press(key).await,
                    None => Err(WorkflowError::ActionFailed("press without key".into())),
                },
                ActionKind::Scroll => {
                    let (dx, dy) = parse_scroll(value);
                    driver.scroll(dx, dy).await
                }
                other => Err(WorkflowError::ActionFailed(format!(
                    "{other:?} step has no target"
                ))),
            };
            return StepResult {
                index: step.index,
                action: step.action,
                success: outcome.is_ok(),
                error: outcome.err().map(|e| e.to_string()),
                healed: false,
                heal_level: None,
            };
        };

        // Heal level 1: walk the recorded selector list.
        let mut last_error = None;
        for (attempt, (strategy, selector)) in target.selectors.iter().enumerate() {
            match dispatch(step.action, selector, value, driver).await {
                Ok(()) => {
                    let healed = attempt > 0;
                    if healed {
                        debug!(step = step.index, ?strategy, "selector fallback succeeded");
                    }
                    return StepResult {
                        index: step.index,
                        action: step.action,
                        success: true,
                        error: None,
                        healed,
                        heal_level: healed.then_some(1),
                    };
                }
                Err(err) => last_error = Some(err.to_string()),
            }
        }

        // Heal level 2: re-resolve the element in the latest tree.
        if let Some(tree) = heal_tree {
            if let Some(fresh) = healer::reresolve(tree, target) {
                for (_, selector) in &fresh.selectors {
                    if dispatch(step.action, selector, value, driver).await.is_ok() {
                        return StepResult {
                            index: step.index,
                            action: step.action,
                            success: true,
                            error: None,
                            healed: true,
                            heal_level: Some(2),
                        };
                    }
                }
            }
        }

        StepResult {
            index: step.index,
            action: step.action,
            success: false,
            error: last_error.or_else(|| Some("no selector matched".into())),
            healed: false,
            heal_level: None,
        }
    }
}

async fn dispatch(
    action: ActionKind,
    selector: &str,
    value: Option<&str>,
    driver: &dyn ActionDriver,
) -> Result<()> {
    match action {
        ActionKind::Click => driver.click(selector).await,
        ActionKind::Type => {
            driver
                .type_text(selector, value.unwrap_or_default())
                .await
        }
        ActionKind::Select => {
            driver
                .select_option(selector, value.unwrap_or_default())
                .await
        }
        ActionKind::Hover => driver.hover(selector).await,
        other => Err(WorkflowError::ActionFailed(format!(
            "{other:?} does not take a target"
        ))),
    }
}

/// Fill `{slot}` templates from params, falling back to slot defaults.
fn resolve_value(
    workflow: &CompiledWorkflow,
    step: &WorkflowStep,
    params: &HashMap<String, String>,
) -> Option<String> {
    let raw = step.value.as_ref()?;
    let mut resolved = raw.clone();
    for slot in &workflow.parameter_slots {
        let template = format!("{{{}}}", slot.name);
        if resolved.contains(&template) {
            let filler = params
                .get(&slot.name)
                .or(slot.default_value.as_ref())
                .cloned()
                .unwrap_or_default();
            resolved = resolved.replace(&template, &filler);
        }
    }
    Some(resolved)
}

fn parse_scroll(value: Option<&str>) -> (f64, f64) {
    let Some(raw) = value else {
        return (0.0, 400.0);
    };
    let mut parts = raw.split(',').map(str::trim);
    let dx = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0.0);
    let dy = parts.next().and_then(|p| p.parse().ok()).unwrap_or(400.0);
    (dx, dy)
}
