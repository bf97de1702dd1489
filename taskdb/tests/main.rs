use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use imagegen_broker::{Broker, EnqueueOptions, JobHandle};
use imagegen_core::JobPriority;
use serde_json::json;

#[tokio::test]
async fn job_completes_and_is_reported_by_get_job() {
    let broker = Broker::new();
    broker.spawn_background_tasks();

    let id = broker
        .enqueue("generate", "text_to_image", json!({"n": 1}), EnqueueOptions::default())
        .await;

    broker.consume(
        "generate",
        2,
        Arc::new(|handle: JobHandle| {
            Box::pin(async move {
                handle.update_progress(50).await;
                Ok(json!({"ok": true}))
            })
        }),
    );

    for _ in 0..50 {
        if let Some(job) = broker.get_job(id).await {
            if job.state == imagegen_core::JobState::Completed {
                assert_eq!(job.progress, 100);
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job did not complete in time");
}

#[tokio::test]
async fn retryable_failure_is_retried_then_succeeds() {
    let broker = Broker::new();
    broker.spawn_background_tasks();
    let attempts = Arc::new(AtomicUsize::new(0));

    let id = broker
        .enqueue(
            "generate",
            "text_to_image",
            json!({}),
            EnqueueOptions {
                backoff_base: chrono::Duration::milliseconds(10),
                ..EnqueueOptions::default()
            },
        )
        .await;

    let attempts_clone = attempts.clone();
    broker.consume(
        "generate",
        1,
        Arc::new(move |_handle: JobHandle| {
            let attempts = attempts_clone.clone();
            Box::pin(async move {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(imagegen_core::CoreError::Retryable("transient".into()))
                } else {
                    Ok(json!({"ok": true}))
                }
            })
        }),
    );

    for _ in 0..100 {
        if let Some(job) = broker.get_job(id).await {
            if job.state == imagegen_core::JobState::Completed {
                assert_eq!(attempts.load(Ordering::SeqCst), 2);
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job did not eventually succeed");
}

#[tokio::test]
async fn permanent_failure_marks_job_failed_without_retry() {
    let broker = Broker::new();
    broker.spawn_background_tasks();

    let id = broker
        .enqueue("generate", "text_to_image", json!({}), EnqueueOptions::default())
        .await;

    broker.consume(
        "generate",
        1,
        Arc::new(|_handle: JobHandle| {
            Box::pin(async move { Err(imagegen_core::CoreError::Permanent("prompt filtered".into())) })
        }),
    );

    for _ in 0..50 {
        if let Some(job) = broker.get_job(id).await {
            if job.state == imagegen_core::JobState::Failed {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job did not fail as expected");
}

#[tokio::test]
async fn higher_priority_job_is_claimed_first() {
    let broker = Broker::new();
    broker.spawn_background_tasks();

    let order = Arc::new(tokio::sync::Mutex::new(Vec::new()));

    let low_opts = EnqueueOptions {
        priority: JobPriority::Low,
        ..EnqueueOptions::default()
    };
    let critical_opts = EnqueueOptions {
        priority: JobPriority::Critical,
        ..EnqueueOptions::default()
    };

    let low_id = broker.enqueue("q", "k", json!({}), low_opts).await;
    let critical_id = broker.enqueue("q", "k", json!({}), critical_opts).await;

    let order_clone = order.clone();
    broker.consume(
        "q",
        1,
        Arc::new(move |handle: JobHandle| {
            let order = order_clone.clone();
            Box::pin(async move {
                order.lock().await.push(handle.id);
                Ok(json!({}))
            })
        }),
    );

    tokio::time::sleep(Duration::from_millis(300)).await;
    let seen = order.lock().await;
    assert_eq!(seen.first().copied(), Some(critical_id));
    assert!(seen.contains(&low_id));
}
