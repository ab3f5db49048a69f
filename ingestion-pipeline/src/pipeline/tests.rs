use uuid::Uuid;

use super::*;

async fn test_pipeline() -> (Arc<SurrealDbClient>, IngestionPipeline) {
    let config = AppConfig::for_tests();
    let db = Arc::new(
        SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("Failed to start in-memory surrealdb"),
    );

    let embedding = Arc::new(
        EmbeddingProvider::from_config(&config, None).expect("embedding provider"),
    );
    db.ensure_initialized(embedding.dimension())
        .await
        .expect("schema init");

    let storage = Arc::new(StorageManager::new(&config).await.expect("storage"));
    let pipeline =
        IngestionPipeline::new(Arc::clone(&db), embedding, storage, &config).expect("pipeline");

    (db, pipeline)
}

#[tokio::test]
async fn test_plain_text_upload_processes_into_one_chunk() {
    let (db, pipeline) = test_pipeline().await;

    // Three sentences, ~300 characters, chunk bound 500: exactly one chunk.
    let body = format!(
        "{} first part. {} second part! {} third part?",
        "a".repeat(80),
        "b".repeat(80),
        "c".repeat(80)
    );
    let (document, extraction) = pipeline
        .ingest_upload("notes.txt", "text/plain", Bytes::from(body.clone()), None)
        .await
        .expect("ingest");

    assert_eq!(extraction.confidence, 1.0);
    assert_eq!(document.status, DocumentStatus::Processing);

    let chunk_count = pipeline
        .index_document_now(&document.id)
        .await
        .expect("index");
    assert_eq!(chunk_count, 1);

    let stored = Document::get(&document.id, &db).await.expect("get");
    assert_eq!(stored.status, DocumentStatus::Processed);
    assert!(stored.indexed);
    assert!(stored.processed_at.is_some());
    assert_eq!(stored.text.as_deref(), Some(body.as_str()));
}

#[tokio::test]
async fn test_oversize_upload_rejects_before_any_record() {
    let (db, pipeline) = test_pipeline().await;

    let config = AppConfig::for_tests();
    let too_big = Bytes::from(vec![b'x'; (config.max_file_bytes + 1) as usize]);
    let err = pipeline
        .ingest_upload("huge.txt", "text/plain", too_big, None)
        .await
        .expect_err("should reject");

    assert!(matches!(err, AppError::Oversize { .. }));
    let documents: Vec<Document> = db.get_all_stored_items().await.expect("list");
    assert!(documents.is_empty());
}

#[tokio::test]
async fn test_unsupported_format_rejects_before_any_record() {
    let (db, pipeline) = test_pipeline().await;

    let err = pipeline
        .ingest_upload("archive.tar.gz", "application/gzip", Bytes::from_static(b"x"), None)
        .await
        .expect_err("should reject");

    assert!(matches!(err, AppError::UnsupportedFormat(_)));
    let documents: Vec<Document> = db.get_all_stored_items().await.expect("list");
    assert!(documents.is_empty());
}

#[tokio::test]
async fn test_invalid_pdf_degrades_to_processed_record() {
    let (db, pipeline) = test_pipeline().await;

    let (document, extraction) = pipeline
        .ingest_upload(
            "broken.pdf",
            "application/pdf",
            Bytes::from_static(b"this is not a pdf"),
            None,
        )
        .await
        .expect("degraded ingest should not error");

    assert!(extraction.degraded);
    assert_eq!(extraction.confidence, 0.0);

    pipeline.index_document_now(&document.id).await.expect("index");

    let stored = Document::get(&document.id, &db).await.expect("get");
    assert_eq!(stored.status, DocumentStatus::Processed);
    assert_eq!(stored.confidence, 0.0);
    assert!(stored
        .text
        .as_deref()
        .is_some_and(|text| text.contains("extraction failed")));
}

#[tokio::test]
async fn test_ingest_text_runs_inline_to_processed() {
    let (db, pipeline) = test_pipeline().await;

    let (document, chunk_count) = pipeline
        .ingest_text(
            "Inline ingestion works. It produces chunks immediately.".to_string(),
            "inline.txt",
            Some("owner-9".to_string()),
        )
        .await
        .expect("ingest text");

    assert_eq!(document.status, DocumentStatus::Processed);
    assert!(document.indexed);
    assert_eq!(chunk_count, 1);

    let chunks = DocumentChunk::for_document(&document.id, &db)
        .await
        .expect("chunks");
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].owner_id.as_deref(), Some("owner-9"));
}

#[tokio::test]
async fn test_empty_text_ingest_rejects() {
    let (_db, pipeline) = test_pipeline().await;

    let err = pipeline
        .ingest_text("   \n ".to_string(), "empty.txt", None)
        .await
        .expect_err("should reject");
    assert!(matches!(err, AppError::CorruptInput(_)));
}

#[tokio::test]
async fn test_delete_removes_chunks_then_record_and_is_idempotent() {
    let (db, pipeline) = test_pipeline().await;

    let (document, chunk_count) = pipeline
        .ingest_text(
            "Sentence one lives here. Sentence two lives here. Sentence three lives here."
                .to_string(),
            "victim.txt",
            None,
        )
        .await
        .expect("ingest");
    assert!(chunk_count >= 1);

    let outcome = pipeline.delete_document(&document.id).await.expect("delete");
    assert!(outcome.document_removed);
    assert_eq!(outcome.chunks_removed, chunk_count);
    assert!(!outcome.cancelled_processing);

    let remaining = DocumentChunk::count_for_document(&document.id, &db)
        .await
        .expect("count");
    assert_eq!(remaining, 0);
    assert!(Document::get(&document.id, &db).await.is_err());

    // Second delete is a no-op, not an error.
    let second = pipeline.delete_document(&document.id).await.expect("redelete");
    assert!(!second.document_removed);
    assert_eq!(second.chunks_removed, 0);
    assert!(!second.cancelled_processing);
}

#[tokio::test]
async fn test_stop_processing_cancels_and_clears_chunks() {
    let (db, pipeline) = test_pipeline().await;

    let (document, _extraction) = pipeline
        .ingest_upload(
            "stoppable.txt",
            "text/plain",
            Bytes::from_static(b"One sentence. Two sentences. Three sentences."),
            None,
        )
        .await
        .expect("ingest");
    assert_eq!(document.status, DocumentStatus::Processing);

    let stopped = pipeline.stop_processing(&document.id).await.expect("stop");
    assert_eq!(stopped.status, DocumentStatus::Cancelled);

    // The index pass observes the cancel, rolls back, and writes nothing.
    let chunk_count = pipeline.index_document_now(&document.id).await.expect("index");
    assert_eq!(chunk_count, 0);
    let remaining = DocumentChunk::count_for_document(&document.id, &db)
        .await
        .expect("count");
    assert_eq!(remaining, 0);

    let stored = Document::get(&document.id, &db).await.expect("get");
    assert_eq!(stored.status, DocumentStatus::Cancelled);
}

#[tokio::test]
async fn test_stop_processing_rejects_terminal_status_naming_it() {
    let (_db, pipeline) = test_pipeline().await;

    let (document, _count) = pipeline
        .ingest_text("Already done. Fully processed.".to_string(), "done.txt", None)
        .await
        .expect("ingest");

    let err = pipeline
        .stop_processing(&document.id)
        .await
        .expect_err("should reject");
    match err {
        AppError::Validation(message) => assert!(message.contains("processed")),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_cancel_after_partial_chunk_write_rolls_back() {
    let (db, pipeline) = test_pipeline().await;

    let (document, _extraction) = pipeline
        .ingest_upload(
            "partial.txt",
            "text/plain",
            Bytes::from_static(b"One. Two. Three. Four. Five."),
            None,
        )
        .await
        .expect("ingest");

    // Simulate a run that wrote some chunks before the cancel landed.
    let partial = vec![
        DocumentChunk::new(document.id.clone(), 0, "One.".into(), vec![0.0; 16], None),
        DocumentChunk::new(document.id.clone(), 1, "Two.".into(), vec![0.0; 16], None),
    ];
    DocumentChunk::replace_for_document(&document.id, partial, &db)
        .await
        .expect("partial write");

    Document::try_cancel(&document.id, &db).await.expect("cancel");

    // The next index pass observes the cancel and rolls the partial set back.
    let chunk_count = pipeline.index_document_now(&document.id).await.expect("index");
    assert_eq!(chunk_count, 0);

    let remaining = DocumentChunk::count_for_document(&document.id, &db)
        .await
        .expect("count");
    assert_eq!(remaining, 0);
    let stored = Document::get(&document.id, &db).await.expect("get");
    assert_eq!(stored.status, DocumentStatus::Cancelled);
}

#[tokio::test]
async fn test_index_pass_after_record_deletion_leaves_no_chunks() {
    let (db, pipeline) = test_pipeline().await;

    let (document, _extraction) = pipeline
        .ingest_upload(
            "vanishing.txt",
            "text/plain",
            Bytes::from_static(b"Written. Then the record disappears."),
            None,
        )
        .await
        .expect("ingest");

    // Simulate a run that committed chunks just as the delete sequence
    // removed the record itself.
    let late = vec![DocumentChunk::new(
        document.id.clone(),
        0,
        "Written.".into(),
        vec![0.0; 16],
        None,
    )];
    DocumentChunk::replace_for_document(&document.id, late, &db)
        .await
        .expect("late write");
    Document::delete(&document.id, &db).await.expect("delete record");

    // The pass treats the missing record as cancelled and cleans up.
    let chunk_count = pipeline.index_document_now(&document.id).await.expect("index");
    assert_eq!(chunk_count, 0);

    let remaining = DocumentChunk::count_for_document(&document.id, &db)
        .await
        .expect("count");
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn test_inline_index_cancels_queued_task() {
    let (db, pipeline) = test_pipeline().await;

    let (document, _extraction) = pipeline
        .ingest_upload(
            "inline.txt",
            "text/plain",
            Bytes::from_static(b"Queued first. Indexed inline before any worker ran."),
            None,
        )
        .await
        .expect("ingest");

    let chunk_count = pipeline.index_document_now(&document.id).await.expect("index");
    assert!(chunk_count >= 1);

    // The upload enqueued a background task; the inline pass must have
    // cancelled it so no worker re-runs the same document.
    let task = IndexTask::claim_next_ready(
        &db,
        "worker-test",
        chrono::Utc::now(),
        Duration::from_secs(60),
    )
    .await
    .expect("claim");
    assert!(task.is_none());

    let stored = Document::get(&document.id, &db).await.expect("get");
    assert_eq!(stored.status, DocumentStatus::Processed);
    assert!(stored.indexed);
}

#[tokio::test]
async fn test_delete_mid_processing_reports_cancellation() {
    let (db, pipeline) = test_pipeline().await;

    let (document, _extraction) = pipeline
        .ingest_upload(
            "in-flight.txt",
            "text/plain",
            Bytes::from_static(b"Partially processed. Then deleted."),
            None,
        )
        .await
        .expect("ingest");

    let outcome = pipeline.delete_document(&document.id).await.expect("delete");
    assert!(outcome.cancelled_processing);
    assert!(outcome.document_removed);

    let remaining = DocumentChunk::count_for_document(&document.id, &db)
        .await
        .expect("count");
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn test_worker_task_flow_indexes_document() {
    let (db, pipeline) = test_pipeline().await;

    let (document, _extraction) = pipeline
        .ingest_upload(
            "queued.txt",
            "text/plain",
            Bytes::from_static(b"Queued for the background worker. It will index this."),
            None,
        )
        .await
        .expect("ingest");

    let task = IndexTask::claim_next_ready(
        &db,
        "worker-test",
        chrono::Utc::now(),
        Duration::from_secs(60),
    )
    .await
    .expect("claim")
    .expect("enqueued task should be claimable");
    assert_eq!(task.document_id, document.id);

    pipeline.process_task(task).await.expect("process");

    let stored = Document::get(&document.id, &db).await.expect("get");
    assert_eq!(stored.status, DocumentStatus::Processed);
    assert!(stored.indexed);
    let chunks = DocumentChunk::count_for_document(&document.id, &db)
        .await
        .expect("count");
    assert!(chunks >= 1);
}

#[test]
fn test_retry_delay_backs_off_and_caps() {
    assert_eq!(retry_delay(1), Duration::from_secs(5));
    assert_eq!(retry_delay(2), Duration::from_secs(10));
    assert_eq!(retry_delay(3), Duration::from_secs(20));
    assert_eq!(retry_delay(20), Duration::from_secs(RETRY_MAX_DELAY_SECS));
}
