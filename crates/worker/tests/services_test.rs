#[cfg(test)]
mod services_tests {
    use std::sync::Arc;

    use chrono::Utc;
    use harvester_core::models::{
        BrokerCategory, BrokerReference, EntityDefinition, HistoryEvent, HistoryReport, TaskDefinition,
    };
    use harvester_core::{HarvesterError, Registries};
    use harvester_testing_utils::{
        records, MockCrudRepository, MockHistoryRepository, MockInputBroker, MockInputConnector,
        TaskDefinitionBuilder,
    };
    use harvester_worker::{
        register_builtin, BrokersService, ExecutionService, ProcessesService, TasksService,
    };
    use uuid::Uuid;

    fn tasks_with_input(input: MockInputBroker) -> TasksService {
        let mut registries = Registries::new();
        register_builtin(&mut registries);
        registries
            .inputs
            .register_factory(Arc::new(MockInputConnector { prototype: input }));
        let executor =
            ExecutionService::new(Arc::new(registries), Arc::new(ProcessesService::new()));
        TasksService::new(
            Arc::new(MockCrudRepository::<TaskDefinition>::new()),
            Arc::new(MockHistoryRepository::new()),
        )
        .with_executor(Arc::new(executor))
    }

    #[tokio::test]
    async fn test_task_delete_purges_history() {
        let history = MockHistoryRepository::new();
        let service = TasksService::new(
            Arc::new(MockCrudRepository::<TaskDefinition>::new()),
            Arc::new(history.clone()),
        );
        let task_id = service
            .create(TaskDefinitionBuilder::new().with_name("nightly").build())
            .await
            .unwrap();

        let other = Uuid::new_v4();
        for owner in [task_id, other] {
            harvester_core::traits::HistoryRepository::create(
                &history,
                HistoryEvent {
                    id: Uuid::new_v4(),
                    task_id: owner,
                    start: Utc::now(),
                    end: Utc::now(),
                    report: HistoryReport::default(),
                },
            )
            .await
            .unwrap();
        }

        assert_eq!(service.get(task_id).await.unwrap().title(), "nightly");
        assert!(service.delete(task_id).await.unwrap());
        assert!(!service.delete(task_id).await.unwrap());

        let remaining = history.events();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].task_id, other);
        assert!(matches!(
            service.get(task_id).await,
            Err(HarvesterError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_task_is_rejected() {
        let service = TasksService::new(
            Arc::new(MockCrudRepository::<TaskDefinition>::new()),
            Arc::new(MockHistoryRepository::new()),
        );
        let task = TaskDefinitionBuilder::new().with_destinations(vec![]).build();
        assert!(matches!(
            service.create(task).await,
            Err(HarvesterError::InvalidDefinition(_))
        ));
        assert!(service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_brokers_by_category() {
        let mut registries = Registries::new();
        register_builtin(&mut registries);
        let service = BrokersService::new(
            Arc::new(MockCrudRepository::<BrokerReference>::new()),
            Arc::new(registries),
        );

        let inbound = service
            .create(
                BrokerCategory::Inbound,
                EntityDefinition::new("FOLDER").with_property("f-root-folder", "/data/in"),
                "file:///data/in/",
            )
            .await
            .unwrap();
        service
            .create(
                BrokerCategory::Outbound,
                EntityDefinition::new("CONSOLE"),
                "console",
            )
            .await
            .unwrap();

        let listed = service.list(Some(BrokerCategory::Inbound)).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, inbound);
        assert_eq!(service.list(None).await.unwrap().len(), 2);

        // CONSOLE 不是数据源
        let err = service
            .create(BrokerCategory::Inbound, EntityDefinition::new("CONSOLE"), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, HarvesterError::NotFound { .. }));

        // 缺少必填参数
        assert!(service
            .update(inbound, EntityDefinition::new("FOLDER"))
            .await
            .is_err());
        assert_eq!(service.read(inbound).await.unwrap().unwrap().id, inbound);
    }

    #[tokio::test]
    async fn test_fetch_content_reads_single_record() {
        let input = MockInputBroker::new("mock://source").with_records(records(3));
        let log = input.log();
        let service = tasks_with_input(input);
        let task_id = service
            .create(TaskDefinitionBuilder::new().build())
            .await
            .unwrap();

        let params = [("password".to_string(), "s3cret".to_string())]
            .into_iter()
            .collect();
        let data = service.fetch_content(task_id, "rec-1", params).await.unwrap();
        assert_eq!(data.id, "rec-1");

        let err = service
            .fetch_content(task_id, "rec-9", Default::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HarvesterError::NotFound { .. }));

        let log = log.lock().unwrap();
        assert_eq!(log.read_ids, vec!["rec-1", "rec-9"]);
        assert_eq!(log.initialized, 2);
        assert_eq!(log.terminated, 2);
    }

    #[tokio::test]
    async fn test_fetch_content_requires_known_task_and_executor() {
        let service = tasks_with_input(MockInputBroker::new("mock://source"));
        let err = service
            .fetch_content(Uuid::new_v4(), "rec-0", Default::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HarvesterError::NotFound { .. }));

        let without_executor = TasksService::new(
            Arc::new(MockCrudRepository::<TaskDefinition>::new()),
            Arc::new(MockHistoryRepository::new()),
        );
        let task_id = without_executor
            .create(TaskDefinitionBuilder::new().build())
            .await
            .unwrap();
        assert!(matches!(
            without_executor
                .fetch_content(task_id, "rec-0", Default::default())
                .await,
            Err(HarvesterError::Configuration(_))
        ));
    }
}
