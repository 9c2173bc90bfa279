//! Action trace recording.

use chrono::Utc;
use tracing::debug;
use url::Url;

use crate::errors::{Result, WorkflowError};
use crate::model::{RecordedAction, WorkflowTrace};

/// Records agent actions between `start` and `stop` for later compilation.
#[derive(Default)]
pub struct ActionRecorder {
    active: Option<InProgress>,
}

struct InProgress {
    task: String,
    steps: Vec<RecordedAction>,
}

impl ActionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    pub fn start(&mut self, task: impl Into<String>) -> Result<()> {
        let task = task.into();
        if let Some(current) = &self.active {
            return Err(WorkflowError::AlreadyRecording(current.task.clone()));
        }
        debug!(task = %task, "recording started");
        self.active = Some(InProgress {
            task,
            steps: Vec::new(),
        });
        Ok(())
    }

    pub fn record(&mut self, action: RecordedAction) -> Result<()> {
        let recording = self.active.as_mut().ok_or(WorkflowError::NotRecording)?;
        recording.steps.push(action);
        Ok(())
    }

    /// Finish the recording and return the trace. The site domain is taken
    /// from the first step's URL.
    pub fn stop(&mut self, success: bool) -> Result<WorkflowTrace> {
        let recording = self.active.take().ok_or(WorkflowError::NotRecording)?;
        let site_domain = recording
            .steps
            .first()
            .and_then(|s| domain_of(&s.url_before))
            .unwrap_or_default();
        debug!(
            task = %recording.task,
            steps = recording.steps.len(),
            success,
            "recording stopped"
        );
        Ok(WorkflowTrace {
            task: recording.task,
            site_domain,
            steps: recording.steps,
            success,
            recorded_at: Utc::now(),
        })
    }
}

fn domain_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
}
