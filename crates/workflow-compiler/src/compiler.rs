//! Trace-to-workflow compilation.

use chrono::Utc;
use tracing::debug;

use crate::model::{
    task_fingerprint, CompiledWorkflow, ParameterSlot, WorkflowStep, WorkflowTrace,
};

#[derive(Default)]
pub struct WorkflowCompiler;

impl WorkflowCompiler {
    pub fn new() -> Self {
        Self
    }

    /// Compile a trace into a replayable workflow. Step values named by a
    /// parameter slot are rewritten to `{slot}` templates and substituted
    /// at execution time.
    pub fn compile(
        &self,
        trace: &WorkflowTrace,
        parameter_slots: Vec<ParameterSlot>,
    ) -> CompiledWorkflow {
        let fingerprint = task_fingerprint(&trace.task);

        let steps = trace
            .steps
            .iter()
            .enumerate()
            .map(|(index, recorded)| {
                let value = recorded.value.as_ref().map(|raw| {
                    parameter_slots
                        .iter()
                        .find(|slot| slot.step_indices.contains(&index))
                        .map(|slot| format!("{{{}}}", slot.name))
                        .unwrap_or_else(|| raw.clone())
                });
                WorkflowStep {
                    index,
                    action: recorded.action,
                    target: recorded.target.clone(),
                    value,
                }
            })
            .collect::<Vec<_>>();

        debug!(
            task = %trace.task,
            steps = steps.len(),
            slots = parameter_slots.len(),
            "compiled workflow"
        );
        CompiledWorkflow {
            workflow_id: fingerprint.clone(),
            task: trace.task.clone(),
            task_fingerprint: fingerprint,
            site_domain: trace.site_domain.clone(),
            steps,
            parameter_slots,
            compiled_at: Utc::now(),
        }
    }
}
