//! Best-effort persistence of a finished exchange
//!
//! A [`PipelineContext`] is recorded at most once. Insert failures are logged
//! and turned into absent rows; nothing here ever fails the client-facing path.

use crate::domain::context::PipelineContext;
use crate::domain::records::{Alert, Output, Prompt};
use crate::infrastructure::alert_queue::AlertQueue;
use crate::infrastructure::fim_cache::FimCache;
use crate::infrastructure::store::RecordStore;
use crate::Result;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

/// Writes prompts, outputs and alerts through a [`RecordStore`]
pub struct DbRecorder {
    store: Arc<dyn RecordStore>,
    fim_cache: Arc<FimCache>,
    alert_queue: AlertQueue,
}

impl DbRecorder {
    pub fn new(
        store: Arc<dyn RecordStore>,
        fim_cache: Arc<FimCache>,
        alert_queue: AlertQueue,
    ) -> Self {
        Self {
            store,
            fim_cache,
            alert_queue,
        }
    }

    pub async fn record_request(&self, prompt: Option<&Prompt>) -> Option<Prompt> {
        let prompt = prompt?;

        match self.store.insert_prompt(prompt).await {
            Ok(recorded) => recorded,
            Err(e) => {
                error!(prompt_id = %prompt.id, error = %e, "Failed to record prompt");
                None
            }
        }
    }

    /// Coalesce streamed fragments into a single output row
    ///
    /// The row takes id, prompt id and timestamp from the first fragment; its
    /// payload is the JSON list of every fragment payload in arrival order.
    pub async fn record_outputs(&self, outputs: &[Output]) -> Result<Option<Output>> {
        let Some(first) = outputs.first() else {
            return Ok(None);
        };

        let payloads: Vec<&str> = outputs.iter().map(|o| o.output.as_str()).collect();
        let output = Output {
            output: serde_json::to_string(&payloads)?,
            ..first.clone()
        };

        match self.store.insert_output(&output).await {
            Ok(recorded) => Ok(recorded),
            Err(e) => {
                error!(output_id = %output.id, error = %e, "Failed to record output");
                Ok(None)
            }
        }
    }

    /// Insert every alert on its own task, then notify critical ones in
    /// submission order
    ///
    /// The returned rows line up with `alerts`; a failed insert is `None` and
    /// never affects its siblings.
    pub async fn record_alerts(&self, alerts: &[Alert]) -> Vec<Option<Alert>> {
        let handles: Vec<_> = alerts
            .iter()
            .cloned()
            .map(|alert| {
                let store = Arc::clone(&self.store);
                tokio::spawn(async move {
                    match store.insert_alert(&alert).await {
                        Ok(recorded) => recorded,
                        Err(e) => {
                            error!(alert_id = %alert.id, error = %e, "Failed to record alert");
                            None
                        }
                    }
                })
            })
            .collect();

        let mut recorded = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(alert) => recorded.push(alert),
                Err(e) => {
                    error!(error = %e, "Alert insert task did not complete");
                    recorded.push(None);
                }
            }
        }

        for alert in recorded.iter().flatten().filter(|a| a.is_critical()) {
            self.alert_queue.notify(alert.timestamp);
        }

        recorded
    }

    pub fn should_record_context(&self, context: Option<&PipelineContext>) -> bool {
        let Some(context) = context else {
            debug!("No context to record");
            return false;
        };

        if context.is_recorded() {
            debug!("Context already recorded");
            return false;
        }

        let Some(prompt) = context.input_request.as_ref() else {
            warn!("Context has no input request, skipping recording");
            return false;
        };

        if prompt.is_fim() {
            return self.fim_cache.could_store_fim_request(context);
        }

        true
    }

    async fn record_exchange(&self, context: &PipelineContext) -> Result<()> {
        self.record_request(context.input_request.as_ref()).await;
        self.record_outputs(&context.output_responses).await?;
        self.record_alerts(&context.alerts_raised).await;
        Ok(())
    }

    /// Record the exchange once; errors are logged, never returned
    #[instrument(skip_all)]
    pub async fn record_context(&self, context: Option<&mut PipelineContext>) {
        let Some(context) = context else {
            debug!("No context to record");
            return;
        };

        if !self.should_record_context(Some(&*context)) {
            return;
        }

        match self.record_exchange(context).await {
            Ok(()) => {
                context.mark_recorded();
                info!(
                    prompt_id = context.input_request.as_ref().map(|p| p.id.as_str()),
                    outputs = context.output_responses.len(),
                    alerts = context.alerts_raised.len(),
                    "Recorded pipeline context"
                );
            }
            Err(e) => error!(error = %e, ?context, "Failed to record context"),
        }
    }

    /// Record on a detached task so client cancellation cannot interrupt it
    pub fn spawn_record(
        self: &Arc<Self>,
        mut context: PipelineContext,
    ) -> JoinHandle<PipelineContext> {
        let recorder = Arc::clone(self);
        tokio::spawn(async move {
            recorder.record_context(Some(&mut context)).await;
            context
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::records::PromptType;
    use crate::infrastructure::alert_queue::{alert_queue, AlertReceiver};
    use crate::Error;
    use async_trait::async_trait;
    use chrono::{TimeDelta, Utc};
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};
    use std::time::Duration;

    #[derive(Default)]
    struct FakeStore {
        prompts: Mutex<Vec<Prompt>>,
        outputs: Mutex<Vec<Output>>,
        /// In completion order
        alerts: Mutex<Vec<Alert>>,
        alert_delays: HashMap<String, Duration>,
        failing_alerts: HashSet<String>,
        fail_prompts: bool,
    }

    #[async_trait]
    impl RecordStore for FakeStore {
        async fn insert_prompt(&self, prompt: &Prompt) -> Result<Option<Prompt>> {
            if self.fail_prompts {
                return Err(Error::NotInitialized);
            }
            self.prompts.lock().push(prompt.clone());
            Ok(Some(prompt.clone()))
        }

        async fn insert_output(&self, output: &Output) -> Result<Option<Output>> {
            self.outputs.lock().push(output.clone());
            Ok(Some(output.clone()))
        }

        async fn insert_alert(&self, alert: &Alert) -> Result<Option<Alert>> {
            if let Some(delay) = self.alert_delays.get(&alert.id) {
                tokio::time::sleep(*delay).await;
            }
            if self.failing_alerts.contains(&alert.id) {
                return Err(Error::NotInitialized);
            }
            self.alerts.lock().push(alert.clone());
            Ok(Some(alert.clone()))
        }
    }

    fn recorder_with(store: Arc<FakeStore>) -> (DbRecorder, AlertReceiver) {
        let (queue, rx) = alert_queue();
        let cache = Arc::new(FimCache::new(Duration::from_secs(60)));
        (DbRecorder::new(store, cache, queue), rx)
    }

    fn chat_context() -> PipelineContext {
        PipelineContext::new(Prompt::new(
            "openai",
            r#"{"messages":[{"role":"user","content":"hi"}]}"#,
            PromptType::Chat,
        ))
    }

    fn fim_context() -> PipelineContext {
        PipelineContext::new(Prompt::new(
            "ollama",
            r#"{"prompt":"fn main() {"}"#,
            PromptType::Fim,
        ))
    }

    #[tokio::test]
    async fn test_outputs_are_coalesced_into_one_row() {
        let store = Arc::new(FakeStore::default());
        let (recorder, _rx) = recorder_with(store.clone());
        let first = Output::new("p1", "a");
        let second = Output {
            output: "b".to_string(),
            ..first.clone()
        };

        let recorded = recorder
            .record_outputs(&[first.clone(), second])
            .await
            .unwrap()
            .unwrap();

        assert_eq!(recorded.id, first.id);
        assert_eq!(recorded.fragments().unwrap(), vec!["a", "b"]);
        assert_eq!(store.outputs.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_inputs_are_no_ops() {
        let store = Arc::new(FakeStore::default());
        let (recorder, _rx) = recorder_with(store.clone());

        assert!(recorder.record_request(None).await.is_none());
        assert!(recorder.record_outputs(&[]).await.unwrap().is_none());
        assert!(recorder.record_alerts(&[]).await.is_empty());
        assert!(store.outputs.lock().is_empty());
    }

    #[tokio::test]
    async fn test_critical_notifications_follow_submission_order() {
        let t0 = Utc::now();
        let mut a = Alert::new("p1", "codegate-secrets", "critical");
        a.timestamp = t0;
        let b = Alert::new("p1", "codegate-context", "info");
        let mut c = Alert::new("p1", "codegate-secrets", "critical");
        c.timestamp = t0 + TimeDelta::seconds(1);

        let store = Arc::new(FakeStore {
            alert_delays: HashMap::from([
                (a.id.clone(), Duration::from_millis(60)),
                (c.id.clone(), Duration::from_millis(30)),
            ]),
            ..FakeStore::default()
        });
        let (recorder, mut rx) = recorder_with(store.clone());

        let recorded = recorder
            .record_alerts(&[a.clone(), b.clone(), c.clone()])
            .await;

        let completion_order: Vec<_> = store.alerts.lock().iter().map(|x| x.id.clone()).collect();
        assert_eq!(completion_order, vec![b.id, c.id.clone(), a.id.clone()]);

        let ids: Vec<_> = recorded.iter().flatten().map(|x| x.id.clone()).collect();
        assert_eq!(ids[0], a.id);
        assert_eq!(ids[2], c.id);

        assert_eq!(rx.recv().await.unwrap().timestamp, t0);
        assert_eq!(rx.recv().await.unwrap().timestamp, t0 + TimeDelta::seconds(1));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failed_alert_does_not_affect_siblings() {
        let a = Alert::new("p1", "codegate-secrets", "critical");
        let b = Alert::new("p1", "codegate-secrets", "critical");
        let store = Arc::new(FakeStore {
            failing_alerts: HashSet::from([a.id.clone()]),
            ..FakeStore::default()
        });
        let (recorder, mut rx) = recorder_with(store.clone());

        let recorded = recorder.record_alerts(&[a, b.clone()]).await;

        assert!(recorded[0].is_none());
        assert_eq!(recorded[1].as_ref().unwrap().id, b.id);
        assert_eq!(rx.recv().await.unwrap().timestamp, b.timestamp);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_recording_twice_persists_once() {
        let store = Arc::new(FakeStore::default());
        let (recorder, _rx) = recorder_with(store.clone());
        let mut context = chat_context();
        let prompt_id = context.input_request.as_ref().unwrap().id.clone();
        context.add_output(Output::new(prompt_id, "hello"));

        recorder.record_context(Some(&mut context)).await;
        recorder.record_context(Some(&mut context)).await;

        assert!(context.is_recorded());
        assert_eq!(store.prompts.lock().len(), 1);
        assert_eq!(store.outputs.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_fim_request_is_not_persisted() {
        let store = Arc::new(FakeStore::default());
        let (recorder, _rx) = recorder_with(store.clone());
        let mut first = fim_context();
        let mut duplicate = fim_context();

        recorder.record_context(Some(&mut first)).await;
        recorder.record_context(Some(&mut duplicate)).await;

        assert!(first.is_recorded());
        assert!(!duplicate.is_recorded());
        assert_eq!(store.prompts.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_chat_requests_bypass_the_fim_gate() {
        let store = Arc::new(FakeStore::default());
        let (recorder, _rx) = recorder_with(store.clone());

        for _ in 0..3 {
            let mut context = chat_context();
            recorder.record_context(Some(&mut context)).await;
            assert!(context.is_recorded());
        }

        assert_eq!(store.prompts.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_context_without_request_is_skipped() {
        let store = Arc::new(FakeStore::default());
        let (recorder, _rx) = recorder_with(store.clone());
        let mut context = PipelineContext::default();
        context.add_output(Output::new("p1", "orphan"));

        recorder.record_context(Some(&mut context)).await;
        recorder.record_context(None).await;

        assert!(!context.is_recorded());
        assert!(store.outputs.lock().is_empty());
    }

    #[tokio::test]
    async fn test_failed_prompt_insert_still_records_the_rest() {
        let store = Arc::new(FakeStore {
            fail_prompts: true,
            ..FakeStore::default()
        });
        let (recorder, mut rx) = recorder_with(store.clone());
        let mut context = chat_context();
        let prompt_id = context.input_request.as_ref().unwrap().id.clone();
        context.add_output(Output::new(prompt_id.clone(), "x"));
        context.add_alert(Alert::new(prompt_id, "codegate-secrets", "critical"));

        recorder.record_context(Some(&mut context)).await;

        assert!(context.is_recorded());
        assert!(store.prompts.lock().is_empty());
        assert_eq!(store.outputs.lock().len(), 1);
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_spawned_recording_returns_the_marked_context() {
        let store = Arc::new(FakeStore::default());
        let (recorder, _rx) = recorder_with(store.clone());

        let context = Arc::new(recorder).spawn_record(chat_context()).await.unwrap();

        assert!(context.is_recorded());
        assert_eq!(store.prompts.lock().len(), 1);
    }
}
