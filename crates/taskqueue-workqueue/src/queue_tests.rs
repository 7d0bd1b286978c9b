
    use super::*;
    use std::sync::Mutex;

    use chrono::{Duration, Utc};
    use tempfile::TempDir;
    use uuid::Uuid;

    use crate::registry::{NoopHandler, TaskHandler};

    #[derive(Default)]
    struct RecordingHandler {
        seen: Mutex<Vec<Uuid>>,
    }

    #[async_trait]
    impl TaskHandler for RecordingHandler {
        async fn handle(&self, task: &Task) -> Result<(), WorkQueueError> {
            self.seen.lock().unwrap().push(task.id);
            Ok(())
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl TaskHandler for FailingHandler {
        async fn handle(&self, _task: &Task) -> Result<(), WorkQueueError> {
            Err(WorkQueueError::Execution("smtp refused".to_string()))
        }
    }

    async fn open(dir: &TempDir, registry: Arc<TaskTypeRegistry>) -> FileQueue {
        FileQueue::open(&WorkQueueConfig::new(dir.path()), registry)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_open_creates_directories() {
        let dir = TempDir::new().unwrap();
        let queue = open(&dir, Arc::new(TaskTypeRegistry::new())).await;

        assert_eq!(queue.name(), "main");
        assert!(dir.path().join("queues/main/pending").is_dir());
        assert!(dir.path().join("queues/main/failed").is_dir());
        assert!(!queue.has_work_to_do().await.unwrap());
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(TaskTypeRegistry::new());
        let recorder = Arc::new(RecordingHandler::default());
        registry.register("record", recorder.clone()).unwrap();
        let queue = open(&dir, registry).await;

        let base = Utc::now();
        let mut ids = Vec::new();
        // Enqueued out of creation order
        for offset in [2, 0, 1] {
            let mut task = Task::new("record", serde_json::Value::Null);
            task.created_at = base + Duration::seconds(offset);
            queue.enqueue(&task).await.unwrap();
            ids.push((offset, task.id));
        }
        ids.sort();

        while queue.has_work_to_do().await.unwrap() {
            queue.process_next_task().await.unwrap();
        }

        let expected: Vec<Uuid> = ids.into_iter().map(|(_, id)| id).collect();
        assert_eq!(*recorder.seen.lock().unwrap(), expected);
        assert_eq!(queue.pending_len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_one_task_per_call() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(TaskTypeRegistry::new());
        registry.register("noop", Arc::new(NoopHandler)).unwrap();
        let queue = open(&dir, registry).await;

        queue.enqueue(&Task::new("noop", serde_json::Value::Null)).await.unwrap();
        queue.enqueue(&Task::new("noop", serde_json::Value::Null)).await.unwrap();

        assert!(queue.process_next().await.unwrap());
        assert_eq!(queue.pending_len().await.unwrap(), 1);
        assert!(queue.process_next().await.unwrap());
        assert!(!queue.process_next().await.unwrap());
    }

    #[tokio::test]
    async fn test_handler_failure_moves_to_failed() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(TaskTypeRegistry::new());
        registry.register("mail", Arc::new(FailingHandler)).unwrap();
        let queue = open(&dir, registry).await;

        let task = Task::new("mail", serde_json::json!({"to": "ops"}));
        queue.enqueue(&task).await.unwrap();

        // Not an iteration failure
        queue.process_next_task().await.unwrap();

        assert!(!queue.has_work_to_do().await.unwrap());
        let failed = queue.failed_tasks().await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, task.id);
        assert_eq!(failed[0].attempts, 1);
        assert!(failed[0].last_error.as_deref().unwrap().contains("smtp refused"));
    }

    #[tokio::test]
    async fn test_unknown_task_type_moves_to_failed() {
        let dir = TempDir::new().unwrap();
        let queue = open(&dir, Arc::new(TaskTypeRegistry::new())).await;

        queue.enqueue(&Task::new("mystery", serde_json::Value::Null)).await.unwrap();
        queue.process_next_task().await.unwrap();

        let failed = queue.failed_tasks().await.unwrap();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].last_error.as_deref().unwrap().contains("mystery"));
    }

    #[tokio::test]
    async fn test_corrupt_pending_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let queue = open(&dir, Arc::new(TaskTypeRegistry::new())).await;
        let corrupt = dir.path().join("queues/main/pending/00000000000000000001-x.json");
        std::fs::write(&corrupt, "{truncated").unwrap();

        let err = queue.process_next_task().await.unwrap_err();

        assert!(matches!(err, DaemonError::Collaborator(_)));
        assert!(corrupt.exists());
        assert!(queue.has_work_to_do().await.unwrap());
    }

    #[tokio::test]
    async fn test_named_queues_are_separate() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(TaskTypeRegistry::new());
        let main = open(&dir, registry.clone()).await;
        let mail = FileQueue::open(&WorkQueueConfig::new(dir.path()).with_queue("mail"), registry)
            .await
            .unwrap();

        mail.enqueue(&Task::new("noop", serde_json::Value::Null)).await.unwrap();

        assert!(mail.has_work_to_do().await.unwrap());
        assert!(!main.has_work_to_do().await.unwrap());
    }
