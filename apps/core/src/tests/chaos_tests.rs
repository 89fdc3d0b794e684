// Many senders, overlapping requests, flaky backend: every reply must be well formed
// and every sender must only ever see its own analysis.

use super::mocks::{detail_for, short_for, TestSetup};
use crate::orchestrator::{DetailMode, OrchestratorSettings};
use crate::replies;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_senders_never_see_each_others_analysis() {
    let h = Arc::new(TestSetup::default().build());
    for i in 0..20 {
        h.backend
            .delay_for(&format!("list {}", i), Duration::from_millis((i * 7 % 50) as u64));
    }

    let mut handles = Vec::new();
    for i in 0..20 {
        let h = Arc::clone(&h);
        handles.push(tokio::spawn(async move {
            let sender = format!("whatsapp:+1555000{:04}", i);
            let ingredients = format!("list {}", i);
            h.greet(&sender).await;
            let summary = h.send(&sender, &ingredients).await.joined();
            let detail = h.send(&sender, "details").await.joined();
            (ingredients, summary, detail)
        }));
    }

    for handle in handles {
        let (ingredients, summary, detail) = handle.await.unwrap();
        assert!(summary.contains(&short_for(&ingredients)), "{}", summary);
        assert_eq!(detail, detail_for(&ingredients));
    }
    assert_eq!(h.orchestrator.sessions().len(), 20);
}

#[tokio::test]
async fn test_same_sender_storm_settles_on_a_started_analysis() {
    let h = Arc::new(TestSetup::default().build());
    h.greet("u1").await;
    for i in 0..10 {
        h.backend
            .delay_for(&format!("batch {}", i), Duration::from_millis(((10 - i) * 10) as u64));
    }

    let replies_and_details = futures::future::join_all((0..10).map(|i| {
        let h = Arc::clone(&h);
        async move {
            if i % 3 == 0 {
                h.send("u1", "details").await
            } else {
                h.send("u1", &format!("batch {}", i)).await
            }
        }
    }))
    .await;

    for reply in &replies_and_details {
        assert!(!reply.is_empty());
        assert!(!reply.joined().contains(replies::GENERIC_APOLOGY));
    }

    let session = h.orchestrator.sessions().get("u1").unwrap();
    assert!(!session.pending);
    let stored = session.last_detailed_analysis.expect("one analysis must win");
    assert!((0..10).any(|i| stored == detail_for(&format!("batch {}", i))));
}

#[tokio::test]
async fn test_flaky_backend_keeps_sessions_consistent() {
    let h = Arc::new(
        TestSetup {
            settings: OrchestratorSettings {
                detail_mode: DetailMode::Background,
                ..Default::default()
            },
            ..Default::default()
        }
        .build(),
    );
    for i in (0..30).filter(|i| i % 4 == 0) {
        h.backend.fail_for(&format!("item {}", i));
    }

    let handles: Vec<_> = (0..30)
        .map(|i| {
            let h = Arc::clone(&h);
            tokio::spawn(async move {
                let sender = format!("u{}", i % 5);
                h.send(&sender, &format!("item {}", i)).await
            })
        })
        .collect();
    for handle in handles {
        let reply = handle.await.unwrap();
        assert!(!reply.is_empty());
        assert!(!reply.joined().contains("simulated outage"));
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    for i in 0..5 {
        let session = h.orchestrator.sessions().get(&format!("u{}", i)).unwrap();
        assert!(session.welcomed);
        assert!(!session.pending, "u{} left pending", i);
    }
}
