//! Integration tests against a live Postgres instance plus an in-process
//! broker/tempstore/local blobstore. Requires `DATABASE_URL`; ignored by
//! default the way the teacher gates tests that need an external service.

use std::sync::Arc;

use imagegen_blobstore::{BlobStore, LocalBlobStore};
use imagegen_broker::Broker;
use imagegen_core::{AspectRatio, ReasonCode, UserId};
use imagegen_ledger::Ledger;
use imagegen_orchestrator::{
    GenerationOrchestrator, GenerationStore, ListFilter, OperationCatalog, TextToImageRequest,
    UploadStore,
};
use imagegen_tempstore::TempFileStore;

async fn orchestrator() -> GenerationOrchestrator {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for this test");
    let ledger = Ledger::connect(&url).await.expect("connect ledger");

    let pool = sqlx::PgPool::connect(&url).await.expect("connect pool");
    let tmp = tempfile::tempdir().unwrap();
    let blobstore: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(tmp.path(), "http://localhost/blobs"));
    let tempstore = Arc::new(TempFileStore::new(tmp.path().join("scratch")));
    let broker = Broker::new();

    let orchestrator = GenerationOrchestrator::new(
        ledger,
        blobstore,
        tempstore,
        broker,
        OperationCatalog::new(pool.clone()),
        GenerationStore::new(pool.clone()),
        UploadStore::new(pool),
    );
    orchestrator.init_schema().await.expect("init schema");
    orchestrator
}

#[tokio::test]
#[ignore = "requires a live postgres instance, see DATABASE_URL"]
async fn insufficient_balance_is_rejected_before_any_job_is_enqueued() {
    let orchestrator = orchestrator().await;
    let owner = UserId::new();

    let err = orchestrator
        .submit_text_to_image(TextToImageRequest {
            owner,
            prompt: "a cat wearing a party hat".to_string(),
            number_of_images: 1,
            aspect_ratio: AspectRatio::Square,
            project_id: None,
            request_id: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, imagegen_core::CoreError::InsufficientFunds { .. }));
}

#[tokio::test]
#[ignore = "requires a live postgres instance, see DATABASE_URL"]
async fn funded_request_creates_a_pending_generation_and_enqueues_a_job() {
    let orchestrator = orchestrator().await;
    let owner = UserId::new();
    orchestrator.credit(owner, 1000, ReasonCode::SignupBonus).await.unwrap();

    let outcome = orchestrator
        .submit_text_to_image(TextToImageRequest {
            owner,
            prompt: "a cat wearing a party hat".to_string(),
            number_of_images: 2,
            aspect_ratio: AspectRatio::Wide,
            project_id: None,
            request_id: None,
        })
        .await
        .unwrap();

    let record = orchestrator.get_generation(owner, outcome.generation_id).await.unwrap();
    assert_eq!(record.status, imagegen_core::GenerationStatus::Pending);
    assert_eq!(record.progress, 0);
    assert_eq!(record.request_metadata.number_of_images, 2);
}

#[tokio::test]
#[ignore = "requires a live postgres instance, see DATABASE_URL"]
async fn list_my_generations_excludes_failed_unless_asked() {
    let orchestrator = orchestrator().await;
    let owner = UserId::new();
    orchestrator.credit(owner, 1000, ReasonCode::SignupBonus).await.unwrap();

    orchestrator
        .submit_text_to_image(TextToImageRequest {
            owner,
            prompt: "a dog in a raincoat".to_string(),
            number_of_images: 1,
            aspect_ratio: AspectRatio::Square,
            project_id: None,
            request_id: None,
        })
        .await
        .unwrap();

    let page = orchestrator
        .list_my_generations(owner, 10, ListFilter::default())
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert!(!page.has_more);
}

#[tokio::test]
#[ignore = "requires a live postgres instance, see DATABASE_URL"]
async fn unknown_owner_generation_lookup_is_not_found() {
    let orchestrator = orchestrator().await;
    let err = orchestrator
        .get_generation(UserId::new(), imagegen_core::GenerationId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, imagegen_core::CoreError::NotFound(_)));
}
