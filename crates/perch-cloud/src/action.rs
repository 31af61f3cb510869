//! Planned stack mutations and their outcome

use crate::backend::StackRequest;
use crate::model::Tag;
use crate::params::{ParameterSet, ParameterValue};
use serde::{Deserialize, Serialize};

/// Type of mutation to perform on a stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Create a stack that does not exist yet
    Create,
    /// Update an existing stack in place
    Update,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Update => write!(f, "update"),
        }
    }
}

/// A fully resolved mutation, ready to submit
///
/// The same plan is rendered whether or not it is applied, so a dry run shows
/// exactly what a real run would have sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackPlan {
    pub action: ActionType,
    pub region: String,
    pub request: StackRequest,
}

impl StackPlan {
    pub fn new(action: ActionType, region: impl Into<String>, request: StackRequest) -> Self {
        Self {
            action,
            region: region.into(),
            request,
        }
    }

    pub fn stack_name(&self) -> &str {
        &self.request.name
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.request.parameters
    }

    /// Plain-text preview, one line per item
    pub fn preview(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "{} stack {} in {}",
            self.action, self.request.name, self.region
        )];

        lines.push(format!(
            "  template: {} bytes",
            self.request.template_body.len()
        ));
        if !self.request.capabilities.is_empty() {
            lines.push(format!(
                "  capabilities: {}",
                self.request.capabilities.join(", ")
            ));
        }

        lines.push("  parameters:".to_string());
        for (key, value) in self.request.parameters.iter() {
            lines.push(format!("    {} = {}", key, preview_value(key, value)));
        }

        if !self.request.tags.is_empty() {
            lines.push("  tags:".to_string());
            for Tag { key, value } in &self.request.tags {
                lines.push(format!("    {} = {}", key, value));
            }
        }

        lines
    }

    /// Summary line in the style of `1 to create, 0 to update`
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: usize::from(self.action == ActionType::Create),
            update: usize::from(self.action == ActionType::Update),
            changed_parameters: self
                .request
                .parameters
                .iter()
                .filter(|(_, v)| matches!(v, ParameterValue::Value(_)))
                .count(),
            retained_parameters: self.request.parameters.retained().len(),
        }
    }
}

/// User data is long and base64 encoded; only its size is shown
fn preview_value(key: &str, value: &ParameterValue) -> String {
    match value {
        ParameterValue::Value(v) if key == crate::model::PARAM_USER_DATA => {
            format!("({} bytes, base64)", v.len())
        }
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub changed_parameters: usize,
    pub retained_parameters: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} parameters set, {} retained",
            self.create, self.update, self.changed_parameters, self.retained_parameters
        )
    }
}

/// Result of applying a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ApplyOutcome {
    /// Dry run: nothing was sent to the backend
    Skipped,
    Submitted { stack_id: String },
}

impl ApplyOutcome {
    pub fn stack_id(&self) -> Option<&str> {
        match self {
            ApplyOutcome::Skipped => None,
            ApplyOutcome::Submitted { stack_id } => Some(stack_id),
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, ApplyOutcome::Skipped)
    }
}
