#[cfg(test)]
mod trigger_service_tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use harvester_core::models::{
        HistoryEvent, HistoryReport, TaskDefinition, TriggerDefinition, TriggerRecord,
    };
    use harvester_core::traits::{
        CrudRepository, HarvestExecutor, HistoryRepository, TriggerContext, TriggerState,
    };
    use harvester_core::{HarvesterError, HarvesterResult, Registries};
    use harvester_dispatcher::{
        register_triggers, ExecutorTriggerContext, SchedulerPool, TriggersService,
    };
    use harvester_testing_utils::{
        MockCrudRepository, MockHistoryRepository, TaskDefinitionBuilder,
    };
    use mockall::mock;
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    mock! {
        pub Executor {}

        #[async_trait]
        impl HarvestExecutor for Executor {
            async fn submit(
                &self,
                task_id: Option<Uuid>,
                task: &TaskDefinition,
                cancel: CancellationToken,
            ) -> HarvesterResult<Uuid>;

            async fn execute(
                &self,
                task_id: Option<Uuid>,
                task: &TaskDefinition,
                cancel: CancellationToken,
            ) -> HarvesterResult<HistoryReport>;
        }
    }

    fn idle_executor() -> MockExecutor {
        let mut executor = MockExecutor::new();
        executor
            .expect_execute()
            .returning(|_, _, _| Ok(HistoryReport::default()));
        executor.expect_submit().returning(|_, _, _| Ok(Uuid::new_v4()));
        executor
    }

    fn service(
        executor: MockExecutor,
    ) -> (TriggersService, Arc<MockCrudRepository<TriggerRecord>>) {
        let mut registries = Registries::new();
        register_triggers(&mut registries.triggers, Arc::new(SchedulerPool::new(8, 2)));
        let store = Arc::new(MockCrudRepository::<TriggerRecord>::new());
        let service = TriggersService::new(
            Arc::new(registries),
            store.clone(),
            Arc::new(executor),
            Arc::new(MockHistoryRepository::new()),
        );
        (service, store)
    }

    fn period(value: &str) -> TriggerDefinition {
        TaskDefinitionBuilder::new().build_trigger("PERIOD", &[("t-period", value)])
    }

    #[tokio::test]
    async fn test_schedule_persists_recurring_trigger() {
        let (service, store) = service(idle_executor());
        let task_id = Uuid::new_v4();

        let id = service.schedule(Some(task_id), period("P1D")).await.unwrap();
        assert_eq!(store.count(), 1);
        let record = store.read(id).await.unwrap().unwrap();
        assert_eq!(record.task_id, Some(task_id));
        assert_eq!(record.definition.type_id, "PERIOD");

        let active = service.list_active(Some(task_id)).await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, id);
        assert_eq!(active[0].state, TriggerState::Active);
        assert!(service.list_active(Some(Uuid::new_v4())).await.is_empty());

        service.deactivate(id).await.unwrap();
        assert_eq!(store.count(), 0);
        assert!(service.list_active(None).await.is_empty());
        assert!(matches!(
            service.deactivate(id).await,
            Err(HarvesterError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_activation_is_rolled_back() {
        let (service, store) = service(idle_executor());

        let err = service
            .schedule(Some(Uuid::new_v4()), period("every day"))
            .await
            .unwrap_err();
        assert!(matches!(err, HarvesterError::InvalidDefinition(_)));
        assert_eq!(store.count(), 0);
        assert!(service.list_active(None).await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_type_and_invalid_task_are_rejected() {
        let (service, store) = service(idle_executor());

        let cron = TaskDefinitionBuilder::new().build_trigger("CRON", &[]);
        let err = service.schedule(None, cron).await.unwrap_err();
        assert!(matches!(err, HarvesterError::InvalidDefinition(_)));

        let mut no_destinations = period("P1D");
        no_destinations.task_definition.destinations.clear();
        let err = service.schedule(None, no_destinations).await.unwrap_err();
        assert!(matches!(err, HarvesterError::InvalidDefinition(_)));
        assert_eq!(store.count(), 0);
    }

    #[tokio::test]
    async fn test_now_trigger_is_not_persisted() {
        let mut executor = MockExecutor::new();
        let task_id = Uuid::new_v4();
        executor
            .expect_submit()
            .withf(move |id, _, _| *id == Some(task_id))
            .times(1)
            .returning(|_, _, _| Ok(Uuid::new_v4()));
        let (service, store) = service(executor);

        let now = TaskDefinitionBuilder::new().build_trigger("NOW", &[]);
        let id = service.schedule(Some(task_id), now).await.unwrap();
        assert_eq!(store.count(), 0);
        // 提交之后不再登记为激活的触发器
        assert!(service.list_active(None).await.is_empty());
        assert!(matches!(
            service.deactivate(id).await,
            Err(HarvesterError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_repeated_now_triggers_are_not_retained() {
        let mut executor = MockExecutor::new();
        executor
            .expect_submit()
            .times(100)
            .returning(|_, _, _| Ok(Uuid::new_v4()));
        let (service, store) = service(executor);
        let task_id = Uuid::new_v4();

        for _ in 0..100 {
            let now = TaskDefinitionBuilder::new().build_trigger("NOW", &[]);
            service.schedule(Some(task_id), now).await.unwrap();
        }
        assert!(service.list_active(None).await.is_empty());
        assert_eq!(store.count(), 0);
        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_activate_stored_skips_broken_records() {
        let (service, store) = service(idle_executor());
        let task_id = Uuid::new_v4();
        store
            .create(TriggerRecord {
                task_id: Some(task_id),
                definition: period("PT6H"),
            })
            .await
            .unwrap();
        store
            .create(TriggerRecord {
                task_id: Some(task_id),
                definition: TaskDefinitionBuilder::new().build_trigger("CRON", &[]),
            })
            .await
            .unwrap();

        assert_eq!(service.activate_stored().await.unwrap(), 1);
        assert_eq!(service.list_active(None).await.len(), 1);
        // 已激活的记录不会重复激活
        assert_eq!(service.activate_stored().await.unwrap(), 0);
        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_keeps_records() {
        let (service, store) = service(idle_executor());
        let task_id = Uuid::new_v4();
        service.schedule(Some(task_id), period("P1D")).await.unwrap();
        service.schedule(Some(task_id), period("PT1H")).await.unwrap();

        service.shutdown().await;
        assert!(service.list_active(None).await.is_empty());
        assert_eq!(store.count(), 2);

        assert_eq!(service.activate_stored().await.unwrap(), 2);
        assert_eq!(service.deactivate_for_task(task_id).await.unwrap(), 2);
        assert_eq!(store.count(), 0);
    }

    #[tokio::test]
    async fn test_context_reads_last_harvest_of_task() {
        let task_id = Uuid::new_v4();
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let history: Arc<dyn HistoryRepository> =
            Arc::new(MockHistoryRepository::with_events(vec![HistoryEvent {
                id: Uuid::new_v4(),
                task_id,
                start,
                end: start + chrono::Duration::minutes(5),
                report: HistoryReport::default(),
            }]));
        let executor: Arc<dyn HarvestExecutor> = Arc::new(MockExecutor::new());

        let context = ExecutorTriggerContext::new(Some(task_id), executor.clone(), history.clone());
        assert_eq!(context.last_harvest().await.unwrap(), Some(start));

        let unsaved = ExecutorTriggerContext::new(None, executor, history);
        assert_eq!(unsaved.last_harvest().await.unwrap(), None);
        assert_eq!(unsaved.task_id(), None);
    }
}
