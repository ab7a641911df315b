use crate::application::dashboard::{self, DashboardState};
use crate::config::Settings;
use crate::infrastructure::{
    alert_queue, AlertReceiver, Database, DbReader, DbRecorder, FimCache, SqliteStore,
};
use crate::Result;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, instrument, warn};

/// Main application struct that coordinates all components
pub struct Application {
    settings: Settings,
    database: Arc<Database>,
    recorder: Arc<DbRecorder>,
    reader: DbReader,
    alert_receiver: Option<AlertReceiver>,
}

impl Application {
    #[instrument]
    pub async fn new() -> Result<Self> {
        Self::with_settings(Settings::new()?).await
    }

    /// Initialize the store and build the process-wide recorder, cache and
    /// alert queue
    #[instrument(skip(settings))]
    pub async fn with_settings(settings: Settings) -> Result<Self> {
        info!(path = %settings.database.path.display(), "Opening recording store");
        let mut database = Database::new(&settings.database);
        database.init().await?;
        let pool = database.pool()?.clone();

        let (queue, alert_receiver) = alert_queue();
        let fim_cache = Arc::new(FimCache::new(settings.fim_cache.lifetime()));
        let recorder = Arc::new(DbRecorder::new(
            Arc::new(SqliteStore::new(pool.clone())),
            fim_cache,
            queue,
        ));

        Ok(Self {
            settings,
            database: Arc::new(database),
            recorder,
            reader: DbReader::new(pool),
            alert_receiver: Some(alert_receiver),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn recorder(&self) -> Arc<DbRecorder> {
        Arc::clone(&self.recorder)
    }

    pub fn reader(&self) -> &DbReader {
        &self.reader
    }

    /// Hand the critical alert stream to an external consumer
    ///
    /// When nobody takes it, [`Application::run`] logs each notification.
    pub fn take_alert_receiver(&mut self) -> Option<AlertReceiver> {
        self.alert_receiver.take()
    }

    pub fn router(&self) -> Router {
        dashboard::router(DashboardState::new(
            Arc::clone(&self.database),
            self.reader.clone(),
        ))
    }

    #[instrument(skip(self))]
    pub async fn run(mut self) -> Result<()> {
        if let Some(receiver) = self.alert_receiver.take() {
            tokio::spawn(log_critical_alerts(receiver));
        }

        let address = self.settings.bind_address();
        let listener = TcpListener::bind(&address).await?;
        info!(%address, "Starting Switchyard server");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        self.database.close().await;
        info!("Switchyard server stopped");
        Ok(())
    }
}

async fn log_critical_alerts(mut receiver: AlertReceiver) {
    while let Some(notification) = receiver.recv().await {
        warn!(timestamp = %notification.timestamp, "{notification}");
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        ApplicationSettings, DatabaseSettings, FimCacheSettings, LoggingSettings,
    };
    use crate::domain::context::PipelineContext;
    use crate::domain::records::{Alert, Output, Prompt, PromptType};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn settings(dir: &TempDir) -> Settings {
        Settings {
            application: ApplicationSettings {
                host: "127.0.0.1".to_string(),
                port: 0,
                environment: "test".to_string(),
            },
            database: DatabaseSettings {
                path: dir.path().join("db").join("switchyard.db"),
                schema_path: PathBuf::from(env!("CARGO_MANIFEST_DIR"))
                    .join("sql/schema/schema.sql"),
                max_connections: 2,
            },
            fim_cache: FimCacheSettings { lifetime_secs: 60 },
            logging: LoggingSettings {
                level: "debug".to_string(),
                format: "plain".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_application_bootstraps_store() {
        let dir = TempDir::new().unwrap();
        let app = Application::with_settings(settings(&dir)).await.unwrap();

        assert!(app.settings().database.path.is_file());
        assert!(app.reader().get_prompts_with_output().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recorded_exchange_is_readable_and_alerts_are_queued() {
        let dir = TempDir::new().unwrap();
        let mut app = Application::with_settings(settings(&dir)).await.unwrap();
        let mut alerts = app.take_alert_receiver().unwrap();

        let prompt = Prompt::new("openai", r#"{"messages":[]}"#, PromptType::Chat);
        let prompt_id = prompt.id.clone();
        let mut context = PipelineContext::new(prompt);
        context.add_output(Output::new(prompt_id.clone(), "hello"));
        let alert = Alert::new(prompt_id.clone(), "codegate-secrets", "critical");
        context.add_alert(alert.clone());

        let context = app.recorder().spawn_record(context).await.unwrap();

        assert!(context.is_recorded());
        let rows = app.reader().get_alerts_with_prompt_and_output().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].prompt_id, prompt_id);
        assert_eq!(alerts.recv().await.unwrap().timestamp, alert.timestamp);
        assert!(app.take_alert_receiver().is_none());
    }

    #[tokio::test]
    async fn test_missing_schema_aborts_startup() {
        let dir = TempDir::new().unwrap();
        let mut settings = settings(&dir);
        settings.database.schema_path = dir.path().join("missing.sql");

        let result = Application::with_settings(settings).await;

        assert!(matches!(result, Err(crate::Error::SchemaNotFound { .. })));
    }
}
