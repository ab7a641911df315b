//! The unit of work handed to the recording pipeline

use crate::domain::records::{Alert, Output, Prompt};
use serde_json::Value;
use std::collections::HashMap;

/// Metadata key carrying the idempotency flag
pub const RECORDED_KEY: &str = "stored_in_db";

/// State accumulated over one request/response exchange
///
/// Created upstream per request and filled in as the exchange progresses. The
/// recording pipeline consumes it once and flips [`RECORDED_KEY`] in the
/// metadata bag so a second attempt is a no-op.
#[derive(Debug, Clone, Default)]
pub struct PipelineContext {
    pub input_request: Option<Prompt>,
    pub output_responses: Vec<Output>,
    pub alerts_raised: Vec<Alert>,
    pub metadata: HashMap<String, Value>,
}

impl PipelineContext {
    pub fn new(input_request: Prompt) -> Self {
        Self {
            input_request: Some(input_request),
            ..Self::default()
        }
    }

    /// Append a streamed response fragment; arrival order is preserved
    pub fn add_output(&mut self, output: Output) {
        self.output_responses.push(output);
    }

    pub fn add_alert(&mut self, alert: Alert) {
        self.alerts_raised.push(alert);
    }

    pub fn is_recorded(&self) -> bool {
        self.metadata
            .get(RECORDED_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn mark_recorded(&mut self) {
        self.metadata
            .insert(RECORDED_KEY.to_string(), Value::Bool(true));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::records::PromptType;

    #[test]
    fn test_fresh_context_is_not_recorded() {
        let context = PipelineContext::new(Prompt::new("openai", "{}", PromptType::Chat));
        assert!(!context.is_recorded());
    }

    #[test]
    fn test_mark_recorded_sets_flag() {
        let mut context = PipelineContext::default();
        context.mark_recorded();
        assert!(context.is_recorded());
        assert_eq!(context.metadata[RECORDED_KEY], Value::Bool(true));
    }

    #[test]
    fn test_non_boolean_flag_counts_as_unrecorded() {
        let mut context = PipelineContext::default();
        context
            .metadata
            .insert(RECORDED_KEY.to_string(), Value::String("yes".into()));
        assert!(!context.is_recorded());
    }
}
