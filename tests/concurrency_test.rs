//! Concurrency tests for session handling.
//!
//! These run against an on-disk database with a real connection pool so
//! that rotations actually race on separate connections.

mod common;

use std::sync::Arc;

use tally::auth::RegisterInput;
use tally::{AuthService, Database, MemoryNotifier};

use common::{test_config, PASSWORD};

async fn setup(dir: &tempfile::TempDir) -> (AuthService, String) {
    let db = Database::open(dir.path().join("tally.db"), 5).await.unwrap();
    let service =
        AuthService::new(db, &test_config(), Arc::new(MemoryNotifier::new())).unwrap();

    let session = service
        .register(RegisterInput {
            tenant_name: "Race Co".to_string(),
            email: "racer@race.test".to_string(),
            password: PASSWORD.to_string(),
            first_name: "Rae".to_string(),
            last_name: "Cer".to_string(),
            store_name: "Main Store".to_string(),
            store_address: None,
        })
        .await
        .unwrap();

    (service, session.tokens.refresh_token)
}

/// Concurrent rotations of one refresh token: exactly one wins.
#[tokio::test]
async fn test_concurrent_refresh_single_winner() {
    let dir = tempfile::tempdir().unwrap();
    let (service, token) = setup(&dir).await;

    const ATTEMPTS: usize = 8;

    let mut handles = Vec::new();
    for _ in 0..ATTEMPTS {
        let service = service.clone();
        let token = token.clone();
        handles.push(tokio::spawn(async move { service.refresh(&token).await }));
    }

    let mut winners = Vec::new();
    let mut losers = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(tokens) => winners.push(tokens),
            Err(e) => losers.push(e.message()),
        }
    }

    assert_eq!(winners.len(), 1, "losers: {:?}", losers);
    assert_eq!(losers.len(), ATTEMPTS - 1);
    for message in &losers {
        assert_eq!(message, "refresh token has been revoked");
    }

    // every losing attempt counts as reuse, so the winner's pair is revoked too
    let err = service
        .refresh(&winners[0].refresh_token)
        .await
        .unwrap_err();
    assert_eq!(err.message(), "refresh token has been revoked");
}

/// Sequential reuse after a completed rotation revokes the replacement.
#[tokio::test]
async fn test_reuse_after_rotation_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let (service, token) = setup(&dir).await;

    let rotated = service.refresh(&token).await.unwrap();
    assert_ne!(rotated.refresh_token, token);

    let err = service.refresh(&token).await.unwrap_err();
    assert_eq!(err.message(), "refresh token has been revoked");

    let err = service.refresh(&rotated.refresh_token).await.unwrap_err();
    assert_eq!(err.message(), "refresh token has been revoked");
}
