#[cfg(test)]
mod app_tests {
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use harvester::{load_task, Application, ShutdownManager};
    use harvester_core::models::{BrokerCategory, EntityDefinition, TaskDefinition};
    use harvester_core::AppConfig;
    use harvester_testing_utils::TaskDefinitionBuilder;
    use harvester_worker::plugins::source_folder;
    use tokio_util::sync::CancellationToken;
    use url::Url;

    fn folder_source(input: &Path) -> EntityDefinition {
        EntityDefinition::new("FOLDER").with_property("f-root-folder", input.display().to_string())
    }

    fn folder_destination(output: &Path) -> EntityDefinition {
        EntityDefinition::new("FOLDER").with_property("f-root-folder", output.display().to_string())
    }

    fn output_subfolder(input: &Path, output: &Path) -> std::path::PathBuf {
        let canonical = std::fs::canonicalize(input).unwrap();
        output.join(source_folder(&Url::from_directory_path(&canonical).unwrap()))
    }

    async fn app() -> Application {
        Application::new(AppConfig::default()).await.unwrap()
    }

    #[tokio::test]
    async fn test_run_once_from_task_file() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        std::fs::write(input.path().join("a.xml"), "<a/>").unwrap();
        std::fs::write(input.path().join("b.xml"), "<b/>").unwrap();

        let task = TaskDefinition::new(
            folder_source(input.path()),
            vec![folder_destination(output.path())],
        );
        let task_file = output.path().join("task.json");
        std::fs::write(&task_file, serde_json::to_string(&task).unwrap()).unwrap();

        let app = app().await;
        let loaded = load_task(&task_file).await.unwrap();
        assert_eq!(loaded, task);

        let report = app.run_once(&loaded, CancellationToken::new()).await.unwrap();
        assert_eq!(report.acquired, 2);
        assert_eq!(report.created, 2);
        assert!(output_subfolder(input.path(), output.path())
            .join("b.xml")
            .exists());
    }

    #[tokio::test]
    async fn test_load_task_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let task_file = dir.path().join("task.json");
        std::fs::write(&task_file, "{ not json").unwrap();

        assert!(load_task(&task_file).await.is_err());
        assert!(load_task(dir.path().join("missing.json")).await.is_err());
    }

    #[tokio::test]
    async fn test_run_once_resolves_stored_broker() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        std::fs::write(input.path().join("only.xml"), "<only/>").unwrap();

        let app = app().await;
        let broker_id = app
            .brokers()
            .create(BrokerCategory::Inbound, folder_source(input.path()), "local folder")
            .await
            .unwrap();

        let task = TaskDefinition::new(
            EntityDefinition::reference_to(broker_id),
            vec![folder_destination(output.path())],
        );
        let report = app.run_once(&task, CancellationToken::new()).await.unwrap();
        assert_eq!(report.acquired, 1);
        assert_eq!(report.created, 1);
    }

    #[tokio::test]
    async fn test_run_once_rejects_task_without_destinations() {
        let app = app().await;
        let task = TaskDefinition::new(EntityDefinition::new("FOLDER"), Vec::new());
        assert!(app.run_once(&task, CancellationToken::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_templates_cover_builtin_plugins() {
        let mut config = AppConfig::default();
        config.harvest.locale = "en".to_string();
        let app = Application::new(config).await.unwrap();

        let templates = app.templates();
        let types = |templates: &[harvester_core::models::UiTemplate]| {
            templates
                .iter()
                .map(|t| t.type_id.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(types(&templates.triggers), vec!["AT", "NOW", "PERIOD"]);
        assert_eq!(types(&templates.inputs), vec!["FOLDER"]);
        assert_eq!(types(&templates.outputs), vec!["CONSOLE", "FOLDER"]);
        assert_eq!(types(&templates.filters), vec!["REGEX"]);
        assert_eq!(types(&templates.transformers), vec!["REPLACE"]);
    }

    #[tokio::test]
    async fn test_daemon_runs_period_trigger_until_shutdown() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        std::fs::write(input.path().join("a.xml"), "<a/>").unwrap();

        let app = Arc::new(app().await);
        let task = TaskDefinitionBuilder::new()
            .with_source(folder_source(input.path()))
            .with_destinations(vec![folder_destination(output.path())]);
        let task_id = app.tasks().create(task.build()).await.unwrap();

        let trigger = TaskDefinitionBuilder::new()
            .with_source(folder_source(input.path()))
            .with_destinations(vec![folder_destination(output.path())])
            .build_trigger("PERIOD", &[("t-period", "P1D")]);
        app.triggers().schedule(Some(task_id), trigger).await.unwrap();

        let shutdown = ShutdownManager::new();
        let shutdown_rx = shutdown.subscribe().await;
        let handle = {
            let app = Arc::clone(&app);
            tokio::spawn(async move { app.run(shutdown_rx).await })
        };

        // 首次运行立即发生，等待历史写入
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let history = app.tasks().history().list(task_id).await.unwrap();
                if !history.is_empty() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(app.triggers().list_active(Some(task_id)).await.len(), 1);

        shutdown.shutdown().await;
        handle.await.unwrap().unwrap();
        assert!(app.triggers().list_active(None).await.is_empty());
    }
}
