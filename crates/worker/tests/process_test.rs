#[cfg(test)]
mod process_tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use harvester_core::models::{
        content_kind, DataReference, EntityDefinition, ProcessStatus, PublishingStatus,
    };
    use harvester_core::traits::{FilterFactory, InitContext, OutputBroker, TransformerFactory};
    use harvester_core::HarvesterError;
    use harvester_testing_utils::{
        records, DataReferenceBuilder, MockInputBroker, MockOutputBroker, ScriptedRecord,
        TaskDefinitionBuilder,
    };
    use harvester_worker::collector::MAX_CONSECUTIVE_INPUT_ERRORS;
    use harvester_worker::plugins::{RegexFilterFactory, ReplaceTransformerFactory};
    use harvester_worker::{DataCollector, ProcessInstance, ProcessListener};
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingListener {
        statuses: Mutex<Vec<ProcessStatus>>,
        processed: Mutex<Vec<DataReference>>,
        errors: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ProcessListener for RecordingListener {
        async fn on_status_change(&self, _process_id: Uuid, status: ProcessStatus) {
            self.statuses.lock().unwrap().push(status);
        }

        async fn on_data_processed(
            &self,
            _process_id: Uuid,
            data: &DataReference,
            _status: PublishingStatus,
        ) {
            self.processed.lock().unwrap().push(data.clone());
        }

        async fn on_error(&self, _process_id: Uuid, error: &HarvesterError) {
            self.errors.lock().unwrap().push(error.to_string());
        }
    }

    fn process_with(
        input: MockInputBroker,
        outputs: Vec<MockOutputBroker>,
        cancel: CancellationToken,
    ) -> ProcessInstance {
        let task = TaskDefinitionBuilder::new().build();
        let outputs: Vec<Box<dyn OutputBroker>> = outputs
            .into_iter()
            .map(|o| Box::new(o) as Box<dyn OutputBroker>)
            .collect();
        let collector =
            DataCollector::new(Box::new(input), outputs, InitContext::new(None, task.clone()));
        ProcessInstance::new(None, task, collector, cancel)
    }

    fn stale_and_current() -> Vec<String> {
        let mut ids: Vec<String> = (0..5).map(|i| format!("rec-{i}")).collect();
        ids.push("old-1".to_string());
        ids.push("old-2".to_string());
        ids
    }

    #[tokio::test]
    async fn test_cleanup_deletes_records_not_seen_again() {
        let input = MockInputBroker::new("mock://source").with_records(records(5));
        let output = MockOutputBroker::new("GPT").with_cleanup(stale_and_current());
        let log = output.log();

        let process = process_with(input, vec![output], CancellationToken::new());
        let report = process.run().await.unwrap();

        let log = log.lock().unwrap();
        // 7 条已有记录，本次重新发布 5 条，删除剩余 2 条
        assert_eq!(log.deleted, vec!["old-1", "old-2"]);
        assert_eq!(log.snapshot_source.as_ref().unwrap().as_str(), "mock://source");
        assert_eq!(log.terminated, 1);
        assert_eq!(report.acquired, 5);
        assert_eq!(report.updated, 5);
        assert_eq!(report.created, 0);
        assert_eq!(process.status(), ProcessStatus::Completed);
    }

    #[tokio::test]
    async fn test_non_negligible_error_suppresses_cleanup() {
        let input = MockInputBroker::new("mock://source").with_records(records(5));
        let output = MockOutputBroker::new("GPT")
            .with_cleanup(stale_and_current())
            .failing_on(["rec-2"]);
        let log = output.log();

        let process = process_with(input, vec![output], CancellationToken::new());
        let report = process.run().await.unwrap();

        let log = log.lock().unwrap();
        assert!(log.deleted.is_empty());
        assert_eq!(log.published.len(), 4);
        assert_eq!(report.failed, 1);
        assert_eq!(report.failed_to_publish, 1);
        assert_eq!(process.status(), ProcessStatus::Completed);
    }

    #[tokio::test]
    async fn test_negligible_rejection_keeps_cleanup() {
        let input = MockInputBroker::new("mock://source").with_records(records(5));
        let output = MockOutputBroker::new("GPT")
            .with_cleanup(stale_and_current())
            .rejecting(["rec-2"]);
        let log = output.log();

        let process = process_with(input, vec![output], CancellationToken::new());
        let report = process.run().await.unwrap();

        // 被拒绝的记录没有重新发布，同样视为过期
        assert_eq!(log.lock().unwrap().deleted, vec!["old-1", "old-2", "rec-2"]);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn test_outputs_fail_independently() {
        let input = MockInputBroker::new("mock://source").with_records(records(3));
        let first = MockOutputBroker::new("A").failing_on(["rec-1"]);
        let second = MockOutputBroker::new("B");
        let (first_log, second_log) = (first.log(), second.log());

        let process = process_with(input, vec![first, second], CancellationToken::new());
        let report = process.run().await.unwrap();

        assert_eq!(first_log.lock().unwrap().published, vec!["rec-0", "rec-2"]);
        assert_eq!(
            second_log.lock().unwrap().published,
            vec!["rec-0", "rec-1", "rec-2"]
        );
        assert_eq!(report.acquired, 3);
        assert_eq!(report.created, 5);
        assert_eq!(report.failed_to_publish, 1);
    }

    #[tokio::test]
    async fn test_failed_next_is_reported_and_iteration_continues() {
        let input = MockInputBroker::new("mock://source")
            .with_step(ScriptedRecord::Record(DataReferenceBuilder::new("a").build()))
            .with_step(ScriptedRecord::Fail("格式错误".to_string()))
            .with_step(ScriptedRecord::Record(DataReferenceBuilder::new("b").build()));
        let output = MockOutputBroker::new("GPT").with_cleanup(["stale"]);
        let log = output.log();

        let process = process_with(input, vec![output], CancellationToken::new());
        let report = process.run().await.unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.published, vec!["a", "b"]);
        assert!(log.deleted.is_empty());
        assert_eq!(report.acquired, 2);
        assert_eq!(report.failed_to_harvest, 1);
    }

    #[tokio::test]
    async fn test_stalled_input_stops_after_consecutive_errors() {
        let input = MockInputBroker::new("mock://source").stalled();
        let input_log = input.log();
        let output = MockOutputBroker::new("GPT").with_cleanup(["stale"]);
        let log = output.log();

        let process = process_with(input, vec![output], CancellationToken::new());
        let report = tokio::time::timeout(std::time::Duration::from_secs(5), process.run())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(input_log.lock().unwrap().next_calls, MAX_CONSECUTIVE_INPUT_ERRORS);
        assert_eq!(report.failed_to_harvest, MAX_CONSECUTIVE_INPUT_ERRORS as u64);
        assert_eq!(report.acquired, 0);
        assert!(log.lock().unwrap().deleted.is_empty());
        assert_eq!(input_log.lock().unwrap().terminated, 1);
        assert_eq!(process.status(), ProcessStatus::Completed);
    }

    #[tokio::test]
    async fn test_successful_read_resets_input_error_count() {
        let mut input = MockInputBroker::new("mock://source");
        for id in ["a", "b"] {
            for _ in 1..MAX_CONSECUTIVE_INPUT_ERRORS {
                input = input.with_step(ScriptedRecord::Fail("格式错误".to_string()));
            }
            input = input.with_step(ScriptedRecord::Record(DataReferenceBuilder::new(id).build()));
        }
        let output = MockOutputBroker::new("GPT");
        let log = output.log();

        let process = process_with(input, vec![output], CancellationToken::new());
        let report = process.run().await.unwrap();

        assert_eq!(log.lock().unwrap().published, vec!["a", "b"]);
        assert_eq!(
            report.failed_to_harvest,
            2 * (MAX_CONSECUTIVE_INPUT_ERRORS as u64 - 1)
        );
    }

    #[tokio::test]
    async fn test_failed_has_next_ends_iteration() {
        let input = MockInputBroker::new("mock://source")
            .with_records(records(5))
            .failing_has_next_at(2);
        let output = MockOutputBroker::new("GPT");
        let log = output.log();

        let process = process_with(input, vec![output], CancellationToken::new());
        let report = process.run().await.unwrap();

        assert_eq!(log.lock().unwrap().published, vec!["rec-0", "rec-1"]);
        assert_eq!(report.failed_to_harvest, 1);
        assert_eq!(process.status(), ProcessStatus::Completed);
    }

    #[tokio::test]
    async fn test_cancelled_run_stops_and_skips_cleanup() {
        let input = MockInputBroker::new("mock://source").with_records(records(3));
        let input_log = input.log();
        let output = MockOutputBroker::new("GPT").with_cleanup(["stale"]);
        let log = output.log();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let process = process_with(input, vec![output], cancel);
        let listener = Arc::new(RecordingListener::default());
        process.add_listener(listener.clone());
        let report = process.run().await.unwrap();

        let log = log.lock().unwrap();
        assert!(log.published.is_empty());
        assert!(log.deleted.is_empty());
        assert_eq!(log.terminated, 1);
        assert_eq!(input_log.lock().unwrap().terminated, 1);
        assert_eq!(report.acquired, 0);
        // 取消不计入失败数
        assert_eq!(report.failed, 0);
        assert_eq!(listener.errors.lock().unwrap().len(), 1);
        assert!(process.is_cancelled());
    }

    #[tokio::test]
    async fn test_initialize_failure_terminates_initialized_brokers() {
        let input = MockInputBroker::new("mock://source").with_records(records(2));
        let input_log = input.log();
        let healthy = MockOutputBroker::new("A");
        let healthy_log = healthy.log();
        let broken = MockOutputBroker::new("B").failing_initialize();

        let process = process_with(input, vec![healthy, broken], CancellationToken::new());
        let listener = Arc::new(RecordingListener::default());
        process.add_listener(listener.clone());

        let err = process.run().await.unwrap_err();
        assert!(matches!(err, HarvesterError::Processor(_)));
        assert_eq!(process.status(), ProcessStatus::Submitted);
        assert_eq!(input_log.lock().unwrap().terminated, 1);
        let healthy_log = healthy_log.lock().unwrap();
        assert_eq!(healthy_log.terminated, 1);
        assert!(healthy_log.published.is_empty());
        assert_eq!(
            *listener.statuses.lock().unwrap(),
            vec![ProcessStatus::Submitted]
        );
    }

    #[tokio::test]
    async fn test_status_sequence_and_double_run() {
        let input = MockInputBroker::new("mock://source").with_records(records(1));
        let process = Arc::new(process_with(
            input,
            vec![MockOutputBroker::new("GPT")],
            CancellationToken::new(),
        ));
        let listener = Arc::new(RecordingListener::default());
        process.add_listener(listener.clone());

        process.init().await;
        process.init().await;
        let report = process.begin().await.unwrap().unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(
            *listener.statuses.lock().unwrap(),
            vec![
                ProcessStatus::Submitted,
                ProcessStatus::Working,
                ProcessStatus::Completed
            ]
        );

        let err = process.run().await.unwrap_err();
        assert!(matches!(err, HarvesterError::Processor(_)));
    }

    #[tokio::test]
    async fn test_filters_and_transformers() {
        let input = MockInputBroker::new("mock://source").with_records(vec![
            DataReferenceBuilder::new("keep")
                .with_source_uri("http://source.example.com/keep.xml")
                .with_content(content_kind::APPLICATION_XML, "<title>draft</title>")
                .build(),
            DataReferenceBuilder::new("drop")
                .with_source_uri("http://elsewhere.org/drop.xml")
                .build(),
        ]);
        let output = MockOutputBroker::new("GPT");
        let log = output.log();

        let filter = RegexFilterFactory
            .build(
                &EntityDefinition::new("REGEX")
                    .with_property("f-regex-pattern", r"http://source\.example\.com/.*"),
            )
            .unwrap();
        let transformer = ReplaceTransformerFactory
            .build(
                &EntityDefinition::new("REPLACE")
                    .with_property("t-replace-pattern", "draft")
                    .with_property("t-replace-with", "final"),
            )
            .unwrap();

        let task = TaskDefinitionBuilder::new().build();
        let collector = DataCollector::new(
            Box::new(input),
            vec![Box::new(output) as Box<dyn OutputBroker>],
            InitContext::new(None, task.clone()),
        )
        .with_filters(vec![filter])
        .with_transformers(vec![transformer]);
        let process = ProcessInstance::new(None, task, collector, CancellationToken::new());
        let listener = Arc::new(RecordingListener::default());
        process.add_listener(listener.clone());

        let report = process.run().await.unwrap();

        assert_eq!(log.lock().unwrap().published, vec!["keep"]);
        assert_eq!(report.acquired, 2);
        assert_eq!(report.created, 1);
        assert_eq!(report.failed, 0);
        let processed = listener.processed.lock().unwrap();
        assert_eq!(
            processed[0].content(content_kind::APPLICATION_XML).unwrap(),
            b"<title>final</title>"
        );
    }

    #[tokio::test]
    async fn test_cleanup_disabled_for_run() {
        let input = MockInputBroker::new("mock://source").with_records(records(1));
        let output = MockOutputBroker::new("GPT").with_cleanup(["stale"]);
        let log = output.log();
        let task = TaskDefinitionBuilder::new().build();
        let collector = DataCollector::new(
            Box::new(input),
            vec![Box::new(output) as Box<dyn OutputBroker>],
            InitContext::new(None, task.clone()).with_cleanup(false),
        );

        let process = ProcessInstance::new(None, task, collector, CancellationToken::new());
        process.run().await.unwrap();

        let log = log.lock().unwrap();
        assert!(log.deleted.is_empty());
        assert!(log.snapshot_source.is_none());
    }
}
