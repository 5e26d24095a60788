#[cfg(test)]
mod folder_connectors_tests {
    use std::path::Path;
    use std::sync::Arc;

    use harvester_core::models::{content_kind, EntityDefinition, TaskDefinition};
    use harvester_core::traits::HarvestExecutor;
    use harvester_core::Registries;
    use harvester_worker::plugins::source_folder;
    use harvester_worker::{register_builtin, ExecutionService, ProcessesService};
    use tokio_util::sync::CancellationToken;
    use url::Url;

    fn executor() -> ExecutionService {
        let mut registries = Registries::new();
        register_builtin(&mut registries);
        ExecutionService::new(Arc::new(registries), Arc::new(ProcessesService::new()))
    }

    fn folder_task(input: &Path, output: &Path, cleanup: bool) -> TaskDefinition {
        TaskDefinition::new(
            EntityDefinition::new("FOLDER")
                .with_property("f-root-folder", input.display().to_string())
                .with_property("f-pattern", "*.xml"),
            vec![EntityDefinition::new("FOLDER")
                .with_property("f-root-folder", output.display().to_string())
                .with_property("f-cleanup", cleanup.to_string())],
        )
    }

    #[tokio::test]
    async fn test_folder_to_folder_with_cleanup() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        std::fs::write(input.path().join("a.xml"), "<a/>").unwrap();
        std::fs::create_dir(input.path().join("nested")).unwrap();
        std::fs::write(input.path().join("nested").join("b.xml"), "<b/>").unwrap();
        std::fs::write(input.path().join("notes.txt"), "skip me").unwrap();

        let canonical = std::fs::canonicalize(input.path()).unwrap();
        let subfolder = output
            .path()
            .join(source_folder(&Url::from_directory_path(&canonical).unwrap()));
        std::fs::create_dir_all(&subfolder).unwrap();
        std::fs::write(subfolder.join("stale.xml"), "<old/>").unwrap();

        let service = executor();
        let task = folder_task(input.path(), output.path(), true);
        let report = service
            .execute(None, &task, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.acquired, 2);
        assert_eq!(report.created, 2);
        assert_eq!(
            std::fs::read_to_string(subfolder.join("a.xml")).unwrap(),
            "<a/>"
        );
        assert!(subfolder.join("nested_b.xml").exists());
        assert!(!subfolder.join("stale.xml").exists());

        // 第二次运行更新已有文件
        let report = service
            .execute(None, &task, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.updated, 2);
        assert_eq!(report.created, 0);
    }

    #[tokio::test]
    async fn test_cleanup_flag_off_keeps_files() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        std::fs::write(input.path().join("a.xml"), "<a/>").unwrap();

        let canonical = std::fs::canonicalize(input.path()).unwrap();
        let subfolder = output
            .path()
            .join(source_folder(&Url::from_directory_path(&canonical).unwrap()));
        std::fs::create_dir_all(&subfolder).unwrap();
        std::fs::write(subfolder.join("stale.xml"), "<old/>").unwrap();

        let report = executor()
            .execute(
                None,
                &folder_task(input.path(), output.path(), false),
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.created, 1);
        assert!(subfolder.join("stale.xml").exists());
    }

    #[tokio::test]
    async fn test_missing_input_folder_fails_setup() {
        let output = tempfile::tempdir().unwrap();
        let missing = output.path().join("does-not-exist");

        let err = executor()
            .execute(
                None,
                &folder_task(&missing, output.path(), false),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, harvester_core::HarvesterError::Processor(_)));
    }

    #[tokio::test]
    async fn test_fetch_content_from_folder() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        std::fs::create_dir(input.path().join("nested")).unwrap();
        std::fs::write(input.path().join("nested").join("b.xml"), "<b/>").unwrap();

        let service = executor();
        let task = folder_task(input.path(), output.path(), false);
        let data = service
            .fetch_content(None, &task, "nested/b", Default::default())
            .await
            .unwrap();
        assert_eq!(data.id, "nested/b");
        assert_eq!(
            data.content(content_kind::APPLICATION_XML),
            Some(b"<b/>".as_slice())
        );
        assert!(data.source_uri.path().ends_with("/nested/b.xml"));

        let err = service
            .fetch_content(None, &task, "nested/missing", Default::default())
            .await
            .unwrap_err();
        assert!(matches!(err, harvester_core::HarvesterError::NotFound { .. }));

        // 不允许跳出根目录
        let err = service
            .fetch_content(None, &task, "../outside", Default::default())
            .await
            .unwrap_err();
        assert!(matches!(err, harvester_core::HarvesterError::Input(_)));
    }

    #[tokio::test]
    async fn test_sources_with_same_folder_name_do_not_collide() {
        let base = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let first = base.path().join("a").join("in");
        let second = base.path().join("b").join("in");
        std::fs::create_dir_all(&first).unwrap();
        std::fs::create_dir_all(&second).unwrap();
        std::fs::write(first.join("one.xml"), "<one/>").unwrap();
        std::fs::write(second.join("two.xml"), "<two/>").unwrap();

        let service = executor();
        for input in [&first, &second] {
            let report = service
                .execute(
                    None,
                    &folder_task(input, output.path(), true),
                    CancellationToken::new(),
                )
                .await
                .unwrap();
            assert_eq!(report.created, 1);
        }

        let subfolder = |input: &Path| {
            let canonical = std::fs::canonicalize(input).unwrap();
            output
                .path()
                .join(source_folder(&Url::from_directory_path(&canonical).unwrap()))
        };
        assert_ne!(subfolder(&first), subfolder(&second));
        // 第二个数据源的清理不会删除第一个数据源的记录
        assert!(subfolder(&first).join("one.xml").exists());
        assert!(subfolder(&second).join("two.xml").exists());
        assert!(!subfolder(&first).join("two.xml").exists());
    }
}
