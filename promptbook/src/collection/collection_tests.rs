//! Tests for pipeline collections.

#[cfg(test)]
mod tests {
    use crate::archive::save_archive;
    use crate::collection::{
        collection_to_json, create_collection_from_directory, DirectoryCollectionOptions,
        LazyPipelineCollection, PipelineCollection, SimplePipelineCollection,
    };
    use crate::errors::{PromptbookError, UnexpectedError};
    use crate::execution::{ExecutionTools, PipelineCompiler};
    use crate::pipeline::{is_same_pipeline, pipeline_from_json_str, PipelineJson};
    use crate::testing::{chain_pipeline, fan_out_pipeline, hello_pipeline};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const CHAIN_URL: &str = "https://promptbook.studio/examples/chain.book.md";
    const FAN_OUT_URL: &str = "https://promptbook.studio/examples/fan-out.book.md";

    /// Reads `.book.md` sources that hold pipeline JSON.
    struct JsonSourceCompiler {
        calls: AtomicUsize,
    }

    impl JsonSourceCompiler {
        fn new() -> Self {
            Self { calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl PipelineCompiler for JsonSourceCompiler {
        async fn compile(&self, source: &str, _source_file: &str) -> Result<PipelineJson, PromptbookError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            pipeline_from_json_str(source)
        }
    }

    fn chain() -> PipelineJson {
        chain_pipeline(2).with_url(CHAIN_URL)
    }

    fn fan_out() -> PipelineJson {
        fan_out_pipeline(2).with_url(FAN_OUT_URL)
    }

    fn write_json(dir: &Path, name: &str, pipeline: &PipelineJson) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, serde_json::to_string_pretty(pipeline).unwrap()).unwrap();
    }

    // ========================================================================
    // SimplePipelineCollection
    // ========================================================================

    #[tokio::test]
    async fn test_simple_collection_lists_sorted_urls() {
        let collection = SimplePipelineCollection::from_pipelines([hello_pipeline(), fan_out(), chain()]).unwrap();

        let urls = collection.list_pipelines().await.unwrap();
        assert_eq!(urls, vec![CHAIN_URL.to_string(), FAN_OUT_URL.to_string(), hello_pipeline().pipeline_url.unwrap()]);
    }

    #[tokio::test]
    async fn test_get_pipeline_by_url() {
        let collection = SimplePipelineCollection::from_pipelines([hello_pipeline(), chain()]).unwrap();

        let pipeline = collection.get_pipeline_by_url(CHAIN_URL).await.unwrap();
        assert_eq!(pipeline, chain());
    }

    #[tokio::test]
    async fn test_unknown_url_is_not_found() {
        let collection = SimplePipelineCollection::from_pipelines([hello_pipeline()]).unwrap();

        let err = collection.get_pipeline_by_url("https://example.com/missing.book.md").await.unwrap_err();
        assert_eq!(err.name(), "NotFoundError");
        assert!(err.to_string().contains("hello.book.md"), "available URLs are listed: {err}");
    }

    #[test]
    fn test_identical_pipelines_are_merged() {
        let mut collection = SimplePipelineCollection::new();
        assert!(collection.insert(hello_pipeline().with_source_file("./a.book.json")).unwrap());
        assert!(!collection.insert(hello_pipeline().with_source_file("./b.book.md")).unwrap());

        assert_eq!(collection.len(), 1);
        assert_eq!(
            collection.get(&hello_pipeline().pipeline_url.unwrap()).unwrap().source_file.as_deref(),
            Some("./a.book.json")
        );
    }

    #[test]
    fn test_conflicting_pipelines_name_both_files() {
        let mut collection = SimplePipelineCollection::new();
        collection.insert(hello_pipeline().with_source_file("./first.book.json")).unwrap();

        let conflicting = hello_pipeline().with_version("2.0.0").with_source_file("./second.book.json");
        let err = collection.insert(conflicting).unwrap_err();

        assert_eq!(err.name(), "PipelineUrlError");
        let message = err.to_string();
        assert!(message.contains("./first.book.json"), "{message}");
        assert!(message.contains("./second.book.json"), "{message}");
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn test_pipeline_without_url_is_rejected() {
        let err = SimplePipelineCollection::from_pipelines([chain_pipeline(1)]).unwrap_err();
        assert_eq!(err.name(), "PipelineUrlError");
    }

    #[test]
    fn test_invalid_pipeline_is_rejected() {
        let err = SimplePipelineCollection::from_pipelines([hello_pipeline().with_version("latest")]).unwrap_err();
        assert_eq!(err.name(), "PipelineLogicError");
    }

    #[tokio::test]
    async fn test_collection_to_json() {
        let collection = SimplePipelineCollection::from_pipelines([hello_pipeline(), chain()]).unwrap();

        let pipelines = collection_to_json(&collection).await.unwrap();
        assert_eq!(pipelines, vec![chain(), hello_pipeline()]);
    }

    // ========================================================================
    // LazyPipelineCollection
    // ========================================================================

    #[tokio::test]
    async fn test_lazy_collection_loads_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let collection = LazyPipelineCollection::from_source(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, PromptbookError>(vec![hello_pipeline()])
            }
        });

        assert!(!collection.is_loaded());
        collection.list_pipelines().await.unwrap();
        collection.get_pipeline_by_url(&hello_pipeline().pipeline_url.unwrap()).await.unwrap();

        assert!(collection.is_loaded());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_lazy_collection_retries_after_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let collection = LazyPipelineCollection::from_source(move || {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(PromptbookError::from(UnexpectedError::new("source unavailable")))
                } else {
                    Ok(vec![hello_pipeline()])
                }
            }
        });

        assert!(collection.list_pipelines().await.is_err());
        assert!(!collection.is_loaded());

        assert_eq!(collection.list_pipelines().await.unwrap().len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    // ========================================================================
    // Directory collections
    // ========================================================================

    #[tokio::test]
    async fn test_directory_with_compiled_pipelines() {
        let dir = tempfile::tempdir().unwrap();
        write_json(dir.path(), "hello.book.json", &hello_pipeline());
        write_json(dir.path(), "nested/chain.book.json", &chain());
        std::fs::write(dir.path().join("notes.txt"), "not a pipeline").unwrap();

        let collection = create_collection_from_directory(dir.path(), &ExecutionTools::new(), DirectoryCollectionOptions::new())
            .await
            .unwrap();

        assert!(collection.is_loaded());
        assert_eq!(collection.list_pipelines().await.unwrap().len(), 2);

        let loaded = collection.get_pipeline_by_url(CHAIN_URL).await.unwrap();
        assert!(is_same_pipeline(&loaded, &chain()));
        assert_eq!(loaded.source_file.as_deref(), Some("./nested/chain.book.json"));
    }

    #[tokio::test]
    async fn test_directory_without_recursion() {
        let dir = tempfile::tempdir().unwrap();
        write_json(dir.path(), "hello.book.json", &hello_pipeline());
        write_json(dir.path(), "nested/chain.book.json", &chain());

        let options = DirectoryCollectionOptions::new().with_recursive(false);
        let collection = create_collection_from_directory(dir.path(), &ExecutionTools::new(), options)
            .await
            .unwrap();

        assert_eq!(collection.list_pipelines().await.unwrap(), vec![hello_pipeline().pipeline_url.unwrap()]);
    }

    #[tokio::test]
    async fn test_directory_with_archive() {
        let dir = tempfile::tempdir().unwrap();
        save_archive(dir.path().join("library.bookc"), &[hello_pipeline(), chain()]).await.unwrap();
        write_json(dir.path(), "fan-out.book.json", &fan_out());

        let collection = create_collection_from_directory(dir.path(), &ExecutionTools::new(), DirectoryCollectionOptions::new())
            .await
            .unwrap();

        assert_eq!(collection.list_pipelines().await.unwrap().len(), 3);
        let hello = collection.get_pipeline_by_url(&hello_pipeline().pipeline_url.unwrap()).await.unwrap();
        assert_eq!(hello.source_file.as_deref(), Some("./library.bookc"));
    }

    #[tokio::test]
    async fn test_archives_load_before_compiled_files() {
        let dir = tempfile::tempdir().unwrap();
        // "a" sorts before "b", but the archive still loads first.
        write_json(dir.path(), "a.book.json", &hello_pipeline().with_version("2.0.0"));
        save_archive(dir.path().join("b.bookc"), &[hello_pipeline()]).await.unwrap();

        let err = create_collection_from_directory(dir.path(), &ExecutionTools::new(), DirectoryCollectionOptions::new())
            .await
            .unwrap_err();

        assert_eq!(err.name(), "PipelineUrlError");
        let message = err.to_string();
        let archive_at = message.find("./b.bookc").unwrap();
        let json_at = message.find("./a.book.json").unwrap();
        assert!(archive_at < json_at, "{message}");
    }

    #[tokio::test]
    async fn test_compiled_and_source_of_same_pipeline_merge() {
        let dir = tempfile::tempdir().unwrap();
        write_json(dir.path(), "hello.book.json", &hello_pipeline());
        std::fs::write(dir.path().join("hello.book.md"), serde_json::to_string(&hello_pipeline()).unwrap()).unwrap();

        let compiler = Arc::new(JsonSourceCompiler::new());
        let tools = ExecutionTools::new().with_compiler(Arc::clone(&compiler) as Arc<dyn PipelineCompiler>);
        let collection = create_collection_from_directory(dir.path(), &tools, DirectoryCollectionOptions::new())
            .await
            .unwrap();

        assert_eq!(compiler.calls.load(Ordering::SeqCst), 1);
        let urls = collection.list_pipelines().await.unwrap();
        assert_eq!(urls.len(), 1);
        let hello = collection.get_pipeline_by_url(&urls[0]).await.unwrap();
        assert_eq!(hello.source_file.as_deref(), Some("./hello.book.json"));
    }

    #[tokio::test]
    async fn test_sources_need_a_compiler() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.book.md"), "# Hello").unwrap();

        let err = create_collection_from_directory(dir.path(), &ExecutionTools::new(), DirectoryCollectionOptions::new())
            .await
            .unwrap_err();

        assert_eq!(err.name(), "EnvironmentMismatchError");
        assert!(err.to_string().contains("./hello.book.md"));
    }

    #[tokio::test]
    async fn test_bad_file_is_skipped_without_crash() {
        let dir = tempfile::tempdir().unwrap();
        write_json(dir.path(), "hello.book.json", &hello_pipeline());
        std::fs::write(dir.path().join("broken.book.json"), "{ not json").unwrap();

        let err = create_collection_from_directory(dir.path(), &ExecutionTools::new(), DirectoryCollectionOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.name(), "ParseError");

        let options = DirectoryCollectionOptions::new().with_crash_on_error(false);
        let collection = create_collection_from_directory(dir.path(), &ExecutionTools::new(), options)
            .await
            .unwrap();
        assert_eq!(collection.list_pipelines().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_pipelines_without_url_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_json(dir.path(), "hello.book.json", &hello_pipeline());
        write_json(dir.path(), "anonymous.book.json", &chain_pipeline(1));

        let collection = create_collection_from_directory(dir.path(), &ExecutionTools::new(), DirectoryCollectionOptions::new())
            .await
            .unwrap();

        assert_eq!(collection.list_pipelines().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_root_url_is_assigned_and_checked() {
        let dir = tempfile::tempdir().unwrap();
        write_json(dir.path(), "tools/chain.book.json", &chain_pipeline(1));

        let options = DirectoryCollectionOptions::new().with_root_url("https://promptbook.studio/library/");
        let collection = create_collection_from_directory(dir.path(), &ExecutionTools::new(), options.clone())
            .await
            .unwrap();
        assert_eq!(
            collection.list_pipelines().await.unwrap(),
            vec!["https://promptbook.studio/library/tools/chain.book.json".to_string()]
        );

        write_json(dir.path(), "hello.book.json", &hello_pipeline());
        let err = create_collection_from_directory(dir.path(), &ExecutionTools::new(), options)
            .await
            .unwrap_err();
        assert_eq!(err.name(), "PipelineUrlError");
        assert!(err.to_string().contains("root URL"));
    }

    #[tokio::test]
    async fn test_missing_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");

        let err = create_collection_from_directory(&missing, &ExecutionTools::new(), DirectoryCollectionOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.name(), "NotFoundError");
    }

    #[tokio::test]
    async fn test_lazy_directory_defers_loading() {
        let dir = tempfile::tempdir().unwrap();
        let options = DirectoryCollectionOptions::new().with_lazy_loading(true);

        let collection = create_collection_from_directory(dir.path(), &ExecutionTools::new(), options)
            .await
            .unwrap();
        assert!(!collection.is_loaded());

        // Files written after creation are picked up by the first query.
        write_json(dir.path(), "hello.book.json", &hello_pipeline());
        assert_eq!(collection.list_pipelines().await.unwrap().len(), 1);
        assert!(collection.is_loaded());
    }

    #[tokio::test]
    async fn test_directory_collection_to_json() {
        let dir = tempfile::tempdir().unwrap();
        write_json(dir.path(), "hello.book.json", &hello_pipeline());
        write_json(dir.path(), "chain.book.json", &chain());

        let collection = create_collection_from_directory(dir.path(), &ExecutionTools::new(), DirectoryCollectionOptions::new())
            .await
            .unwrap();

        let pipelines = collection_to_json(&collection).await.unwrap();
        let urls: Vec<_> = pipelines.iter().filter_map(|p| p.pipeline_url.clone()).collect();
        assert_eq!(urls, vec![CHAIN_URL.to_string(), hello_pipeline().pipeline_url.unwrap()]);
    }
}
