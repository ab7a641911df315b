//! Infrastructure layer for Switchyard
//!
//! Persistence of recorded exchanges, the FIM dedup gate and the critical
//! alert queue.

pub mod alert_queue;
pub mod database;
pub mod fim_cache;
pub mod reader;
pub mod recorder;
pub mod store;

pub use alert_queue::{alert_queue, AlertQueue, AlertReceiver, CriticalAlertNotification};
pub use database::Database;
pub use fim_cache::FimCache;
pub use reader::{AlertWithPromptAndOutputRow, DbReader, PromptWithOutputRow};
pub use recorder::DbRecorder;
pub use store::{RecordStore, SqliteStore};
