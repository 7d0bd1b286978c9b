//! # taskqueue work queue
//!
//! File-backed collaborators for the `taskqueued` daemon core.
//!
//! ## Features
//!
//! - FIFO task queue, one JSON file per task
//! - Scheduler with one-shot and cron tasks
//! - Task-type registry with built-in handlers
//! - Plugin manifests (TOML) filtered by namespace

pub mod config;
pub mod error;
pub mod plugin;
pub mod queue;
pub mod registry;
pub mod scheduler;
pub mod task;

mod store;

pub use config::WorkQueueConfig;
pub use error::WorkQueueError;
pub use plugin::{ManifestPluginLoader, PluginManifest};
pub use queue::FileQueue;
pub use registry::{TaskHandler, TaskTypeRegistry};
pub use scheduler::FileScheduler;
pub use task::{ScheduledTask, Task};
