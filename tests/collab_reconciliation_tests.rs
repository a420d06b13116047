// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Collaboration session reconciliation on document load.
//!
//! Owners and legacy documents get stale links cleared, public documents
//! are joined, and private documents of other users are left alone.

use diagram_sync::models::{CollabRoom, ListQuery, Visibility};
use diagram_sync::store::{keys, KeyValueStore};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::{controller_with_fakes, seed_login, summary, test_env};

const LINK: &str = "https://draw.example.com/#room=abc123,key456";

async fn mount_document(server: &MockServer, id: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/diagrams/{id}/elements")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"elements": [{"id": "e1"}], "permission": "edit"})),
        )
        .mount(server)
        .await;
}

async fn expect_link_clears(server: &MockServer, id: &str, times: u64) {
    Mock::given(method("PUT"))
        .and(path(format!("/diagrams/{id}/meta")))
        .and(body_partial_json(json!({"collabLink": null})))
        .respond_with(ResponseTemplate::new(200))
        .expect(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_private_document_of_other_user_is_left_alone() {
    let env = test_env().await;
    seed_login(&env.store, "user-2");
    mount_document(&env.server, "d1").await;
    expect_link_clears(&env.server, "d1", 0).await;

    let (controller, fakes) = controller_with_fakes(&env);
    controller.remember_summaries(&[summary("d1", Some("owner-1"), Visibility::Private, Some(LINK))]);

    controller.switch_to("d1").await;
    controller.wait_for_background().await;

    assert_eq!(fakes.log.count("collab_start:abc123"), 0);
    assert_eq!(controller.session().collab_link.as_deref(), Some(LINK));
}

#[tokio::test]
async fn test_owner_clears_stale_link_once() {
    let env = test_env().await;
    seed_login(&env.store, "owner-1");
    mount_document(&env.server, "d1").await;
    expect_link_clears(&env.server, "d1", 1).await;

    let (controller, fakes) = controller_with_fakes(&env);
    controller.remember_summaries(&[summary("d1", Some("owner-1"), Visibility::Public, Some(LINK))]);

    controller.switch_to("d1").await;
    controller.wait_for_background().await;

    assert_eq!(fakes.log.count("collab_start:abc123"), 0);
    assert_eq!(controller.session().collab_link, None);
    assert_eq!(controller.summary("d1").unwrap().collab_link, None);
}

#[tokio::test]
async fn test_legacy_document_link_is_cleared() {
    let env = test_env().await;
    seed_login(&env.store, "user-2");
    mount_document(&env.server, "old").await;
    expect_link_clears(&env.server, "old", 1).await;

    let (controller, _fakes) = controller_with_fakes(&env);
    controller.remember_summaries(&[summary("old", None, Visibility::Private, Some(LINK))]);

    controller.switch_to("old").await;
    controller.wait_for_background().await;

    assert_eq!(controller.session().collab_link, None);
}

#[tokio::test]
async fn test_public_document_of_other_user_is_joined() {
    let env = test_env().await;
    seed_login(&env.store, "user-2");
    mount_document(&env.server, "d1").await;
    expect_link_clears(&env.server, "d1", 0).await;

    let (controller, fakes) = controller_with_fakes(&env);
    controller.remember_summaries(&[summary("d1", Some("owner-1"), Visibility::Public, Some(LINK))]);

    controller.switch_to("d1").await;
    controller.wait_for_background().await;

    assert_eq!(fakes.log.count("collab_start:abc123"), 1);
    assert_eq!(controller.session().collab_link.as_deref(), Some(LINK));
}

#[tokio::test]
async fn test_listing_feeds_reconciliation() {
    let env = test_env().await;
    seed_login(&env.store, "user-2");
    mount_document(&env.server, "d1").await;
    Mock::given(method("GET"))
        .and(path("/diagrams"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "diagrams": [{
                "id": "d1",
                "title": "Shared board",
                "ownerId": "owner-1",
                "visibility": "public",
                "collabLink": LINK,
            }]
        })))
        .mount(&env.server)
        .await;

    let (controller, fakes) = controller_with_fakes(&env);
    let documents = controller.list_documents(&ListQuery::default()).await.unwrap();
    assert_eq!(documents.len(), 1);

    controller.switch_to("d1").await;
    assert_eq!(fakes.log.count("collab_start:abc123"), 1);
}

#[tokio::test]
async fn test_switching_away_leaves_previous_room() {
    let env = test_env().await;
    seed_login(&env.store, "user-2");
    mount_document(&env.server, "d2").await;

    let (controller, fakes) = controller_with_fakes(&env);
    fakes.collab.join(CollabRoom {
        room_id: "other-room".to_string(),
        room_key: "k".to_string(),
    });

    controller.switch_to("d2").await;

    assert_eq!(fakes.log.count("collab_stop"), 1);
    assert_eq!(controller.session().collab_link, None);
}

#[tokio::test]
async fn test_already_in_documents_room_changes_nothing() {
    let env = test_env().await;
    seed_login(&env.store, "owner-1");
    mount_document(&env.server, "d1").await;
    expect_link_clears(&env.server, "d1", 0).await;

    let (controller, fakes) = controller_with_fakes(&env);
    controller.remember_summaries(&[summary("d1", Some("owner-1"), Visibility::Private, Some(LINK))]);
    fakes.collab.join(CollabRoom::from_link(LINK).unwrap());

    controller.switch_to("d1").await;
    controller.wait_for_background().await;

    assert_eq!(fakes.log.count("collab_stop"), 0);
    assert_eq!(fakes.log.count("collab_start:abc123"), 0);
    assert_eq!(controller.session().collab_link.as_deref(), Some(LINK));
}

#[tokio::test]
async fn test_resumed_owner_document_clears_link_without_prior_listing() {
    let env = test_env().await;
    seed_login(&env.store, "owner-1");
    mount_document(&env.server, "d1").await;
    expect_link_clears(&env.server, "d1", 1).await;
    Mock::given(method("GET"))
        .and(path("/diagrams"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "diagrams": [{"id": "d1", "ownerId": "owner-1", "collabLink": LINK}]
        })))
        .expect(1)
        .mount(&env.server)
        .await;
    env.store.set(keys::CURRENT_DOCUMENT, "d1", None).unwrap();

    let (controller, fakes) = controller_with_fakes(&env);
    assert!(controller.summary("d1").is_none());

    controller.restore_last_session().await.unwrap();
    controller.wait_for_background().await;

    assert_eq!(fakes.log.count("collab_start:abc123"), 0);
    assert_eq!(controller.session().collab_link, None);
}

#[tokio::test]
async fn test_ownership_in_elements_payload_skips_listing() {
    let env = test_env().await;
    seed_login(&env.store, "owner-1");
    Mock::given(method("GET"))
        .and(path("/diagrams/d1/elements"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "elements": [{"id": "e1"}],
            "permission": "edit",
            "ownerId": "owner-1",
            "visibility": "public",
            "collabLink": LINK,
        })))
        .mount(&env.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/diagrams"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"diagrams": []})))
        .expect(0)
        .mount(&env.server)
        .await;
    expect_link_clears(&env.server, "d1", 1).await;

    let (controller, _fakes) = controller_with_fakes(&env);
    controller.switch_to("d1").await;
    controller.wait_for_background().await;

    assert_eq!(controller.session().collab_link, None);
    assert_eq!(controller.summary("d1").unwrap().visibility, Visibility::Public);
}
