mod common;

use chrono::{Duration, Utc};
use common::fixture;
use monarch_core::schema::entities::{MODULE, ROLE_MODULE, SESSION, USER};
use monarch_core::{AppError, DomainError, Sessions};
use serde_json::json;

async fn sessions() -> (common::Fixture, Sessions) {
    let fx = fixture().await;
    for (sequence, tag) in [(3, "reports"), (1, "wallets"), (2, "budgets")] {
        let module = fx
            .seed(
                &MODULE,
                json!({ "sequence": sequence, "tag": tag, "icon": tag, "route": format!("/{}", tag) }),
            )
            .await;
        fx.seed(&ROLE_MODULE, json!({ "role": fx.role, "module": module.id() })).await;
    }
    let sessions = Sessions::new(fx.store.clone(), fx.model.clone(), Duration::minutes(15));
    (fx, sessions)
}

#[tokio::test]
async fn sign_in_returns_token_and_ordered_modules() {
    let (fx, sessions) = sessions().await;
    let signed = sessions.sign_in("ana@example.com", "g-ana").await.unwrap();

    assert_eq!(signed.user.id, fx.user);
    assert_eq!(signed.token.len(), 32);
    let tags: Vec<&str> = signed.modules.iter().map(|m| m.tag.as_str()).collect();
    assert_eq!(tags, vec!["wallets", "budgets", "reports"]);
    assert_eq!(fx.count(&SESSION).await, 1);

    let again = sessions.sign_in("ana@example.com", "g-ana").await.unwrap();
    assert_ne!(again.token, signed.token);
}

#[tokio::test]
async fn unknown_and_inactive_users_are_refused() {
    let (fx, sessions) = sessions().await;
    assert!(matches!(
        sessions.sign_in("ana@example.com", "wrong").await,
        Err(AppError::Domain(DomainError::UnknownUser))
    ));

    fx.seed(
        &USER,
        json!({
            "email": "old@example.com", "name": "Old", "surname": "Timer",
            "birthday": "1950-05-05", "googleId": "g-old", "active": false, "role": fx.role
        }),
    )
    .await;
    assert!(matches!(
        sessions.sign_in("old@example.com", "g-old").await,
        Err(AppError::Domain(DomainError::InactiveUser))
    ));
    assert_eq!(fx.count(&SESSION).await, 0);
}

#[tokio::test]
async fn authenticate_slides_the_window() {
    let (_fx, sessions) = sessions().await;
    let signed = sessions.sign_in("ana@example.com", "g-ana").await.unwrap();

    let later = Utc::now() + Duration::minutes(10);
    let auth = sessions.authenticate(&signed.token, later).await.unwrap();
    assert_eq!(auth.user.email, "ana@example.com");
    assert_eq!(auth.session.updated_at.timestamp_micros(), later.timestamp_micros());

    // 10 + 10 minutes since sign-in, but only 10 idle.
    let auth = sessions
        .authenticate(&signed.token, later + Duration::minutes(10))
        .await
        .unwrap();
    assert_eq!(auth.session.id, signed.session);
}

#[tokio::test]
async fn idle_session_expires_and_is_removed() {
    let (fx, sessions) = sessions().await;
    let signed = sessions.sign_in("ana@example.com", "g-ana").await.unwrap();

    let idle = Utc::now() + Duration::minutes(16);
    assert!(matches!(
        sessions.authenticate(&signed.token, idle).await,
        Err(AppError::Domain(DomainError::SessionExpired))
    ));
    assert_eq!(fx.count(&SESSION).await, 0);
    assert!(matches!(
        sessions.authenticate(&signed.token, idle).await,
        Err(AppError::Domain(DomainError::SessionNotFound))
    ));
}

#[tokio::test]
async fn sign_out_deletes_the_session() {
    let (_fx, sessions) = sessions().await;
    let signed = sessions.sign_in("ana@example.com", "g-ana").await.unwrap();

    assert!(sessions.sign_out(signed.session).await.unwrap());
    assert!(!sessions.sign_out(signed.session).await.unwrap());
    assert!(matches!(
        sessions.authenticate(&signed.token, Utc::now()).await,
        Err(AppError::Domain(DomainError::SessionNotFound))
    ));
}
