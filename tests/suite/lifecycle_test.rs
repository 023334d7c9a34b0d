//! Login, data loading, sign-out and account deletion

use crate::common::*;
use assert_matches::assert_matches;
use gavel::client::fetch::FetchReport;
use gavel::client::flow::{AuthStep, Screen, SessionPhase, Tab};
use gavel::client::notify::{NoticeKind, SESSION_EXPIRED_TITLE};
use gavel::client::store::{KeyValueStore, TOKEN_KEY, USER_DATA_KEY};
use gavel::client::validator::{TokenState, Validation};
use gavel::client::{ResourceKind, ResourceStatus, UserProfile};
use gavel::shared::{ApiError, SessionError};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_happy_login() {
    let harness = Harness::start().await;
    Mock::given(method("POST"))
        .and(path(api("auth/")))
        .and(body_json(json!({"email": "a@b.com", "password": "pw", "type": "customer"})))
        .respond_with(ok_json(json!({"success": true, "token": "T", "user": {"fname": "A"}})))
        .expect(1)
        .mount(&harness.server)
        .await;
    mount_resource(&harness.server, AUCTIONS, "T", ok_json(json!({"data": []})), 1).await;
    mount_resource(&harness.server, orders_page(1), "T", ok_json(json!({"data": []})), 1).await;
    mount_resource(&harness.server, TRANSACTIONS, "T", ok_json(json!({"data": []})), 1).await;

    assert_ok!(harness.controller.login("a@b.com", "pw").await);

    let snapshot = harness.controller.snapshot().await;
    assert_eq!(snapshot.phase, SessionPhase::Authenticated);
    assert!(snapshot.is_authenticated);

    let stored = harness.store.load().await.unwrap();
    assert_eq!(stored.token, "T");
    assert_eq!(stored.profile, UserProfile::new(json!({"fname": "A"})));

    // No user id in the profile, so conversations never hit the network.
    assert_eq!(hits(&harness.server, "auction/conversations/u1").await, 0);
    let conversations = harness.controller.collection(ResourceKind::Conversations).await;
    assert_matches!(conversations.status(), ResourceStatus::Error(_));
    assert!(harness.notifier.errors().is_empty());
}

#[tokio::test]
async fn test_login_fetches_all_four_with_bearer_token() {
    let harness = Harness::start().await;
    mount_login(&harness.server, TOKEN, user()).await;
    mount_all_resources(&harness.server, TOKEN, 1).await;

    assert_ok!(harness.controller.login("a@b.com", "pw").await);

    let board = harness.controller.resources().await;
    for collection in board.iter() {
        assert_eq!(collection.status(), &ResourceStatus::Loaded, "{}", collection.kind());
        assert_eq!(collection.items().len(), 1, "{}", collection.kind());
    }
}

#[tokio::test]
async fn test_logout_clears_everything() {
    let harness = Harness::start().await;
    mount_login(&harness.server, TOKEN, user()).await;
    mount_all_resources(&harness.server, TOKEN, 1).await;
    assert_ok!(harness.controller.login("a@b.com", "pw").await);
    let epoch_before = harness.controller.snapshot().await.epoch;

    harness.controller.logout().await;

    assert!(harness.store.load().await.is_none());
    assert_eq!(harness.medium.get(TOKEN_KEY).await.unwrap(), None);
    assert_eq!(harness.medium.get(USER_DATA_KEY).await.unwrap(), None);

    let snapshot = harness.controller.snapshot().await;
    assert_eq!(snapshot.phase, SessionPhase::Anonymous);
    assert_eq!(snapshot.profile, None);
    assert_eq!(snapshot.screen, Screen::Tab(Tab::Home));
    assert!(snapshot.epoch > epoch_before);

    let board = harness.controller.resources().await;
    for collection in board.iter() {
        assert_idle!(collection);
        assert_eq!(collection.error(), None);
    }
    assert_eq!(harness.notifier.titled("Success"), 1);
}

#[tokio::test]
async fn test_logout_when_signed_out_is_harmless() {
    let harness = Harness::start().await;
    harness.controller.logout().await;
    harness.controller.logout().await;
    assert_eq!(harness.controller.snapshot().await.phase, SessionPhase::Anonymous);
    assert!(harness.notifier.errors().is_empty());
}

#[tokio::test]
async fn test_populated_state_is_not_refetched() {
    let harness = Harness::start().await;
    mount_login(&harness.server, TOKEN, user()).await;
    mount_all_resources(&harness.server, TOKEN, 1).await;
    assert_ok!(harness.controller.login("a@b.com", "pw").await);

    // Same session seen again, e.g. after the token reference is re-read.
    assert!(harness.controller.ensure_data_loaded().await.is_none());
    assert!(harness.controller.ensure_data_loaded().await.is_none());

    assert_eq!(hits(&harness.server, "auction/user/1").await, 1);
    assert_eq!(hits(&harness.server, "payment/history").await, 1);
}

#[tokio::test]
async fn test_rejected_login_shows_server_message() {
    let harness = Harness::start().await;
    Mock::given(method("POST"))
        .and(path(api("auth/")))
        .respond_with(ok_json(json!({"success": false, "message": "Invalid email or password"})))
        .mount(&harness.server)
        .await;

    let error = harness.controller.login("a@b.com", "bad").await.unwrap_err();
    assert_eq!(
        error,
        SessionError::Api(ApiError::Rejected {
            message: Some("Invalid email or password".to_string())
        })
    );

    let snapshot = harness.controller.snapshot().await;
    assert_eq!(snapshot.phase, SessionPhase::Anonymous);
    assert!(harness.store.load().await.is_none());

    let errors = harness.notifier.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "Invalid email or password");
}

#[tokio::test]
async fn test_wrong_password_401_is_not_an_expiry() {
    let harness = Harness::start().await;
    Mock::given(method("POST"))
        .and(path(api("auth/")))
        .respond_with(status_json(401, json!({"success": false, "message": "Invalid email or password"})))
        .expect(1)
        .mount(&harness.server)
        .await;

    let error = harness.controller.login("a@b.com", "bad").await.unwrap_err();
    assert_eq!(
        error,
        SessionError::Api(ApiError::status(401, Some("Invalid email or password".to_string())))
    );

    let messages: Vec<String> = harness.notifier.errors().into_iter().map(|n| n.message).collect();
    assert_eq!(messages, vec!["Invalid email or password".to_string()]);
    assert_eq!(harness.notifier.titled(SESSION_EXPIRED_TITLE), 0);
    assert_eq!(harness.controller.snapshot().await.phase, SessionPhase::Anonymous);
}

#[tokio::test]
async fn test_login_failure_classes() {
    let harness = Harness::start().await;
    Mock::given(method("POST"))
        .and(path(api("auth/")))
        .respond_with(status_json(422, json!({"success": false, "message": "Email not verified"})))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&harness.server)
        .await;
    Mock::given(method("POST"))
        .and(path(api("auth/")))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&harness.server)
        .await;

    let error = harness.controller.login("a@b.com", "pw").await.unwrap_err();
    assert_eq!(error.user_message(), "Email not verified");

    assert_err!(
        harness.controller.login("a@b.com", "pw").await,
        SessionError::Api(ApiError::Malformed { .. })
    );

    assert_eq!(harness.controller.snapshot().await.phase, SessionPhase::Anonymous);
    let messages: Vec<String> = harness.notifier.errors().into_iter().map(|n| n.message).collect();
    assert_eq!(
        messages,
        vec![
            "Email not verified".to_string(),
            "Server returned a malformed response.".to_string()
        ]
    );
}

#[tokio::test]
async fn test_protected_tab_resumes_after_login() {
    let harness = Harness::start().await;
    mount_login(&harness.server, TOKEN, user()).await;
    mount_all_resources(&harness.server, TOKEN, 1).await;

    assert_eq!(
        harness.controller.select_tab(Tab::Transactions).await,
        Screen::Auth(AuthStep::SignIn)
    );
    assert_ok!(harness.controller.login("a@b.com", "pw").await);

    let snapshot = harness.controller.snapshot().await;
    assert_eq!(snapshot.screen, Screen::Tab(Tab::Transactions));
    assert_eq!(snapshot.pending_tab, None);
}

#[tokio::test]
async fn test_refresh_retries_one_collection() {
    let harness = Harness::start().await;
    mount_login(&harness.server, TOKEN, user()).await;
    mount_resource(&harness.server, AUCTIONS, TOKEN, ok_json(json!([{"id": 1}])), 1).await;
    mount_resource(&harness.server, TRANSACTIONS, TOKEN, ok_json(json!([{"id": 2}])), 1).await;
    mount_resource(&harness.server, CONVERSATIONS, TOKEN, ok_json(json!([{"id": 3}])), 1).await;
    Mock::given(method("GET"))
        .and(path(api("auction/order/user")))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&harness.server)
        .await;
    mount_resource(&harness.server, orders_page(1), TOKEN, ok_json(json!({"orders": [{"id": 4}]})), 1).await;

    assert_ok!(harness.controller.login("a@b.com", "pw").await);
    assert_matches!(
        harness.controller.collection(ResourceKind::Orders).await.status(),
        ResourceStatus::Error(_)
    );

    assert_eq!(
        harness.controller.refresh(ResourceKind::Orders).await,
        Some(FetchReport::Applied)
    );
    let orders = harness.controller.collection(ResourceKind::Orders).await;
    assert_eq!(orders.status(), &ResourceStatus::Loaded);
    assert_eq!(orders.items(), &[json!({"id": 4})]);
    assert_eq!(harness.controller.collection(ResourceKind::Auctions).await.items().len(), 1);
}

#[tokio::test]
async fn test_load_more_ignores_rapid_repeats() {
    let harness = Harness::start().await;
    mount_login(&harness.server, TOKEN, user()).await;
    mount_all_resources(&harness.server, TOKEN, 1).await;
    mount_resource(
        &harness.server,
        orders_page(2),
        TOKEN,
        delayed(json!({"orders": [{"id": "o2"}]}), Duration::from_millis(200)),
        1,
    )
    .await;
    mount_resource(&harness.server, orders_page(3), TOKEN, ok_json(json!({"orders": []})), 1).await;
    assert_ok!(harness.controller.login("a@b.com", "pw").await);

    let (first, second, third) = tokio::join!(
        harness.controller.load_more_orders(),
        harness.controller.load_more_orders(),
        harness.controller.load_more_orders(),
    );
    let reports = [first, second, third];
    assert_eq!(reports.iter().filter(|r| **r == Some(FetchReport::Applied)).count(), 1);
    assert_eq!(reports.iter().filter(|r| **r == Some(FetchReport::Skipped)).count(), 2);

    let orders = harness.controller.collection(ResourceKind::Orders).await;
    assert_eq!(orders.items(), &[json!({"id": "o1"}), json!({"id": "o2"})]);
    assert_eq!(orders.page(), 2);

    // Page 3 is empty: nothing appended, no further pages requested.
    assert_eq!(harness.controller.load_more_orders().await, Some(FetchReport::Applied));
    let orders = harness.controller.collection(ResourceKind::Orders).await;
    assert!(!orders.has_more());
    assert_eq!(orders.page(), 2);
    assert_eq!(harness.controller.load_more_orders().await, Some(FetchReport::Skipped));
}

#[tokio::test]
async fn test_refresh_during_load_more_does_not_duplicate_orders() {
    let harness = Harness::start().await;
    mount_login(&harness.server, TOKEN, user()).await;
    mount_resource(&harness.server, AUCTIONS, TOKEN, ok_json(json!([])), 1).await;
    mount_resource(&harness.server, TRANSACTIONS, TOKEN, ok_json(json!([])), 1).await;
    mount_resource(&harness.server, CONVERSATIONS, TOKEN, ok_json(json!([])), 1).await;
    mount_resource(&harness.server, orders_page(1), TOKEN, ok_json(json!({"orders": [{"id": "o1"}]})), 2).await;
    mount_resource(
        &harness.server,
        orders_page(2),
        TOKEN,
        delayed(json!({"orders": [{"id": "o2"}]}), Duration::from_millis(300)),
        2,
    )
    .await;
    assert_ok!(harness.controller.login("a@b.com", "pw").await);

    let slow_page = harness.controller.load_more_orders();
    let refresh_then_more = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let refreshed = harness.controller.refresh(ResourceKind::Orders).await;
        let more = harness.controller.load_more_orders().await;
        (refreshed, more)
    };
    let (first, (refreshed, more)) = tokio::join!(slow_page, refresh_then_more);

    // The refresh superseded the page requested before it.
    assert_eq!(first, Some(FetchReport::Stale));
    assert_eq!(refreshed, Some(FetchReport::Applied));
    assert_eq!(more, Some(FetchReport::Applied));

    let orders = harness.controller.collection(ResourceKind::Orders).await;
    assert_eq!(orders.items(), &[json!({"id": "o1"}), json!({"id": "o2"})]);
    assert_eq!(orders.page(), 2);
    assert!(!orders.in_flight());
}

#[tokio::test]
async fn test_load_more_refused_while_refresh_pending() {
    let harness = Harness::start().await;
    mount_login(&harness.server, TOKEN, user()).await;
    mount_resource(&harness.server, AUCTIONS, TOKEN, ok_json(json!([])), 1).await;
    mount_resource(&harness.server, TRANSACTIONS, TOKEN, ok_json(json!([])), 1).await;
    mount_resource(&harness.server, CONVERSATIONS, TOKEN, ok_json(json!([])), 1).await;
    Mock::given(method("GET"))
        .and(path(api("auction/order/user")))
        .respond_with(ok_json(json!({"orders": [{"id": "o1"}]})))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&harness.server)
        .await;
    mount_resource(
        &harness.server,
        orders_page(1),
        TOKEN,
        delayed(json!({"orders": [{"id": "o1"}]}), Duration::from_millis(300)),
        1,
    )
    .await;
    mount_resource(&harness.server, orders_page(2), TOKEN, ok_json(json!({"orders": []})), 0).await;
    assert_ok!(harness.controller.login("a@b.com", "pw").await);

    let refresh = harness.controller.refresh(ResourceKind::Orders);
    let more = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        harness.controller.load_more_orders().await
    };
    let (refreshed, more) = tokio::join!(refresh, more);

    assert_eq!(refreshed, Some(FetchReport::Applied));
    assert_eq!(more, Some(FetchReport::Skipped));
    assert_eq!(
        harness.controller.collection(ResourceKind::Orders).await.items(),
        &[json!({"id": "o1"})]
    );
}

#[tokio::test]
async fn test_delete_account_declined_sends_nothing() {
    let harness = Harness::with(|b| b, RecordingNotifier::answering(false)).await;
    mount_login(&harness.server, TOKEN, user()).await;
    mount_all_resources(&harness.server, TOKEN, 1).await;
    Mock::given(method("DELETE"))
        .and(path(api("users/")))
        .respond_with(ok_json(json!({"success": true})))
        .expect(0)
        .mount(&harness.server)
        .await;
    assert_ok!(harness.controller.login("a@b.com", "pw").await);

    assert_eq!(harness.controller.delete_account().await, Err(SessionError::Cancelled));
    assert_eq!(harness.notifier.confirmations(), 1);
    assert!(harness.controller.is_authenticated().await);
    assert!(harness.store.load().await.is_some());
}

#[tokio::test]
async fn test_delete_account_confirmed() {
    let harness = Harness::with(|b| b, RecordingNotifier::answering(true)).await;
    mount_login(&harness.server, TOKEN, user()).await;
    mount_all_resources(&harness.server, TOKEN, 1).await;
    Mock::given(method("DELETE"))
        .and(path(api("users/")))
        .and(header("authorization", "Bearer T"))
        .respond_with(ok_json(json!({"success": true})))
        .expect(1)
        .mount(&harness.server)
        .await;
    assert_ok!(harness.controller.login("a@b.com", "pw").await);

    assert_ok!(harness.controller.delete_account().await);

    assert!(!harness.controller.is_authenticated().await);
    assert!(harness.store.load().await.is_none());
    for collection in harness.controller.resources().await.iter() {
        assert_idle!(collection);
    }
    let last = harness.notifier.notices().pop().unwrap();
    assert_eq!(last.kind, NoticeKind::Success);
    assert_eq!(last.message, "Account deleted successfully");
}

#[tokio::test]
async fn test_delete_account_failure_keeps_session() {
    let harness = Harness::with(|b| b, RecordingNotifier::answering(true)).await;
    mount_login(&harness.server, TOKEN, user()).await;
    mount_all_resources(&harness.server, TOKEN, 1).await;
    Mock::given(method("DELETE"))
        .and(path(api("users/")))
        .respond_with(ok_json(json!({"success": false, "message": "Pending orders exist"})))
        .mount(&harness.server)
        .await;
    assert_ok!(harness.controller.login("a@b.com", "pw").await);

    let error = harness.controller.delete_account().await.unwrap_err();
    assert_eq!(error.user_message(), "Pending orders exist");
    assert!(harness.controller.is_authenticated().await);
    assert_eq!(harness.store.load().await.unwrap().token, TOKEN);
    assert_eq!(
        harness.controller.collection(ResourceKind::Auctions).await.items().len(),
        1
    );
}

#[tokio::test]
async fn test_periodic_check_ignores_indeterminate() {
    let harness = Harness::start().await;
    mount_login(&harness.server, TOKEN, user()).await;
    mount_all_resources(&harness.server, TOKEN, 1).await;
    mount_me(&harness.server, TOKEN, ResponseTemplate::new(504)).await;
    assert_ok!(harness.controller.login("a@b.com", "pw").await);

    assert_matches!(
        harness.controller.revalidate().await,
        Some(Validation::Indeterminate(_))
    );
    assert!(harness.controller.is_authenticated().await);
    assert!(harness.notifier.errors().is_empty());
}

#[tokio::test]
async fn test_periodic_check_tears_down_on_rejection() {
    let harness = Harness::start().await;
    mount_login(&harness.server, TOKEN, user()).await;
    mount_all_resources(&harness.server, TOKEN, 1).await;
    mount_me(&harness.server, TOKEN, ResponseTemplate::new(401)).await;
    assert_ok!(harness.controller.login("a@b.com", "pw").await);

    assert_eq!(
        harness.controller.revalidate().await,
        Some(Validation::Definite(TokenState::Invalid))
    );
    assert!(!harness.controller.is_authenticated().await);
    assert!(harness.store.load().await.is_none());
    assert_eq!(harness.notifier.titled(SESSION_EXPIRED_TITLE), 1);
}

#[tokio::test]
async fn test_monitor_runs_periodic_check() {
    let harness = Harness::with(
        |b| b.revalidate_interval(Duration::from_millis(100)),
        RecordingNotifier::default(),
    )
    .await;
    mount_login(&harness.server, TOKEN, user()).await;
    mount_all_resources(&harness.server, TOKEN, 1).await;
    mount_me(&harness.server, TOKEN, ResponseTemplate::new(403)).await;
    assert_ok!(harness.controller.login("a@b.com", "pw").await);

    let monitor = harness.controller.start_monitor();
    let mut waited = Duration::ZERO;
    while monitor.state().await.rejections == 0 && waited < Duration::from_secs(5) {
        tokio::time::sleep(Duration::from_millis(50)).await;
        waited += Duration::from_millis(50);
    }

    assert!(!harness.controller.is_authenticated().await);
    assert_eq!(monitor.state().await.rejections, 1);
    assert_eq!(harness.notifier.titled(SESSION_EXPIRED_TITLE), 1);
}
