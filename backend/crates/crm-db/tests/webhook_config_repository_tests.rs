mod common;

use common::create_test_pool;

use crm_core::{WebhookConfig, WebhookEvent, WebhookTarget};
use crm_db::WebhookConfigRepository;

use chrono::Utc;
use googletest::prelude::*;
use uuid::Uuid;

fn create_test_config(target_id: Uuid, event: WebhookEvent) -> WebhookConfig {
    WebhookConfig::new(
        WebhookTarget::Opportunity,
        target_id,
        "https://hooks.example.com/crm".to_string(),
        event,
    )
}

#[tokio::test]
async fn given_config_when_created_then_found_by_id() {
    // Given
    let pool = create_test_pool().await;
    let repo = WebhookConfigRepository::new(pool);
    let config = create_test_config(Uuid::new_v4(), WebhookEvent::Move);

    // When
    repo.create(&config).await.unwrap();

    // Then
    let found = repo.find_by_id(config.id).await.unwrap().unwrap();
    assert_that!(found.url, eq(&config.url));
    assert_that!(found.target_type, eq(WebhookTarget::Opportunity));
    assert_that!(found.event, eq(WebhookEvent::Move));
}

#[tokio::test]
async fn given_mixed_configs_when_matching_then_only_exact_triple_returned() {
    // Given: Configs for two opportunities and two events
    let pool = create_test_pool().await;
    let repo = WebhookConfigRepository::new(pool);
    let opportunity_id = Uuid::new_v4();
    let wanted = create_test_config(opportunity_id, WebhookEvent::Move);
    let other_event = create_test_config(opportunity_id, WebhookEvent::Update);
    let other_target = create_test_config(Uuid::new_v4(), WebhookEvent::Move);
    repo.create(&wanted).await.unwrap();
    repo.create(&other_event).await.unwrap();
    repo.create(&other_target).await.unwrap();

    // When
    let matching = repo
        .find_matching(WebhookTarget::Opportunity, opportunity_id, WebhookEvent::Move)
        .await
        .unwrap();

    // Then
    assert_that!(matching.len(), eq(1));
    assert_that!(matching[0].id, eq(wanted.id));
}

#[tokio::test]
async fn given_multiple_subscribers_when_matching_then_all_returned() {
    // Given: Two configs on the same triple
    let pool = create_test_pool().await;
    let repo = WebhookConfigRepository::new(pool);
    let opportunity_id = Uuid::new_v4();
    let first = create_test_config(opportunity_id, WebhookEvent::Move);
    let mut second = create_test_config(opportunity_id, WebhookEvent::Move);
    second.url = "https://hooks.example.com/other".to_string();
    repo.create(&first).await.unwrap();
    repo.create(&second).await.unwrap();

    // When
    let matching = repo
        .find_matching(WebhookTarget::Opportunity, opportunity_id, WebhookEvent::Move)
        .await
        .unwrap();

    // Then
    assert_that!(matching.len(), eq(2));
}

#[tokio::test]
async fn given_nil_target_config_when_matching_then_acts_as_wildcard() {
    // Given: A type-wide subscription alongside an unrelated exact one
    let pool = create_test_pool().await;
    let repo = WebhookConfigRepository::new(pool);
    let wildcard = create_test_config(Uuid::nil(), WebhookEvent::Create);
    let unrelated = create_test_config(Uuid::new_v4(), WebhookEvent::Create);
    repo.create(&wildcard).await.unwrap();
    repo.create(&unrelated).await.unwrap();

    // When: Matching against an opportunity neither config names
    let matching = repo
        .find_matching(
            WebhookTarget::Opportunity,
            Uuid::new_v4(),
            WebhookEvent::Create,
        )
        .await
        .unwrap();

    // Then
    assert_that!(matching.len(), eq(1));
    assert_that!(matching[0].id, eq(wildcard.id));
}

#[tokio::test]
async fn given_deleted_config_when_matching_then_excluded() {
    // Given
    let pool = create_test_pool().await;
    let repo = WebhookConfigRepository::new(pool);
    let config = create_test_config(Uuid::new_v4(), WebhookEvent::Move);
    repo.create(&config).await.unwrap();

    // When
    repo.delete(config.id, Utc::now().timestamp()).await.unwrap();

    // Then
    let matching = repo
        .find_matching(
            WebhookTarget::Opportunity,
            config.target_id,
            WebhookEvent::Move,
        )
        .await
        .unwrap();
    assert_that!(matching, is_empty());
    assert_that!(repo.find_by_id(config.id).await.unwrap(), none());
}
