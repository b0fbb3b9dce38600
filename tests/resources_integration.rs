//! Integration tests for the user and project sub-clients.

use std::time::Duration;

use futures_util::StreamExt;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use luna_sdk::client::{ENV_API_KEY, ENV_BASE_URL, ENV_MAX_RETRIES};
use luna_sdk::error::ErrorKind;
use luna_sdk::prelude::*;

const KEY: &str = "lk_test_aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

fn client_for(server: &MockServer) -> LunaClient {
    LunaClient::builder()
        .base_url(&server.uri())
        .api_key(KEY)
        .retry(RetryConfig {
            initial_delay: Duration::from_millis(10),
            jitter: 0.0,
            ..RetryConfig::default()
        })
        .build()
        .unwrap()
}

fn user_json(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "email": format!("{}@example.com", name.to_lowercase()),
        "name": name,
        "created_at": "2024-03-01T10:00:00Z",
        "updated_at": "2024-03-02T10:00:00Z"
    })
}

async fn mount_two_user_pages(server: &MockServer) {
    // Mounted first so it wins over the cursor-less mock below.
    Mock::given(method("GET"))
        .and(path("/v1/users"))
        .and(query_param("cursor", "c2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [user_json("usr_3", "Sipho")],
            "has_more": false
        })))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/users"))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [user_json("usr_1", "Ama"), user_json("usr_2", "Kofi")],
            "has_more": true,
            "next_cursor": "c2"
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_list_users_single_page() {
    let server = MockServer::start().await;
    mount_two_user_pages(&server).await;

    let page = client_for(&server)
        .users()
        .list(&ListParams::limit(2))
        .await
        .unwrap();

    assert_eq!(page.data.len(), 2);
    assert!(page.has_more);
    assert_eq!(page.next_cursor.as_deref(), Some("c2"));

    let page = client_for(&server)
        .users()
        .list(&ListParams::limit(2).with_cursor("c2"))
        .await
        .unwrap();
    assert_eq!(page.data[0].name, "Sipho");
}

#[tokio::test]
async fn test_iterate_users_across_pages() {
    let server = MockServer::start().await;
    mount_two_user_pages(&server).await;

    let client = client_for(&server);
    let mut users = client.users().iter(ListParams::limit(2));

    let mut ids = Vec::new();
    while let Some(user) = users.try_next().await.unwrap() {
        ids.push(user.id);
    }
    assert_eq!(ids, vec!["usr_1", "usr_2", "usr_3"]);
    assert_eq!(users.pages_fetched(), 2);
}

#[tokio::test]
async fn test_iterate_resumes_from_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/users"))
        .and(query_param("limit", "10"))
        .and(query_param("cursor", "c5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [user_json("usr_5", "Zanele")],
            "has_more": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let users = client
        .users()
        .iter(ListParams::limit(10).with_cursor("c5"))
        .collect_all()
        .await
        .unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].id, "usr_5");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url.query(), Some("limit=10&cursor=c5"));
}

#[tokio::test]
async fn test_iterate_as_stream() {
    let server = MockServer::start().await;
    mount_two_user_pages(&server).await;

    let client = client_for(&server);
    let names: Vec<String> = client
        .users()
        .iter(ListParams::limit(2))
        .into_stream()
        .map(|user| user.unwrap().name)
        .collect()
        .await;
    assert_eq!(names, vec!["Ama", "Kofi", "Sipho"]);
}

#[tokio::test]
async fn test_iteration_stops_on_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/projects"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut projects = client.projects().iter(ListParams::default());
    let err = projects.try_next().await.unwrap_err();
    assert_eq!(err.api().unwrap().kind, ErrorKind::Authorization);
    assert!(projects.try_next().await.unwrap().is_none());
}

#[tokio::test]
async fn test_invalid_ids_short_circuit() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    for id in ["", "123", "prj_1", "usr_a-b"] {
        let err = client.users().get(id).await.unwrap_err();
        assert!(matches!(err, SdkError::Validation(_)), "id {id:?}");
    }
    let err = client
        .projects()
        .update("usr_1", &ProjectUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SdkError::Validation(_)));
    assert!(matches!(
        client.projects().delete("nope").await,
        Err(SdkError::Validation(_))
    ));

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_requires_fields() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    let err = client
        .users()
        .create(&UserCreate::new("", "Ama"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Validation error: email is required");

    let err = client
        .projects()
        .create(&ProjectCreate::new(" "))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Validation error: name is required");

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_user_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/users"))
        .and(body_json(json!({"email": "ama@example.com", "name": "Ama"})))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .users()
        .create(&UserCreate::new("ama@example.com", "Ama"))
        .await
        .unwrap_err();
    assert_eq!(err.api().unwrap().kind, ErrorKind::Server);
}

#[tokio::test]
async fn test_create_update_delete_project() {
    let server = MockServer::start().await;
    let project = json!({
        "id": "prj_9",
        "name": "Delta",
        "description": "river works",
        "owner_id": "usr_1",
        "created_at": "2024-03-01T10:00:00Z",
        "updated_at": "2024-03-01T10:00:00Z"
    });
    Mock::given(method("POST"))
        .and(path("/v1/projects"))
        .and(body_json(json!({"name": "Delta", "description": "river works"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(project.clone()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/v1/projects/prj_9"))
        .and(body_json(json!({"name": "Delta II"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(project))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1/projects/prj_9"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let created = client
        .projects()
        .create(&ProjectCreate {
            name: "Delta".into(),
            description: Some("river works".into()),
        })
        .await
        .unwrap();
    assert_eq!(created.id, "prj_9");
    assert_eq!(created.description.as_deref(), Some("river works"));

    let update = ProjectUpdate {
        name: Some("Delta II".into()),
        ..Default::default()
    };
    client.projects().update("prj_9", &update).await.unwrap();
    client.projects().delete("prj_9").await.unwrap();
}

#[tokio::test]
async fn test_client_from_env() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/users/usr_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json("usr_1", "Ama")))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let client = LunaClientBuilder::with_env(|name| match name {
        ENV_API_KEY => Some(KEY.to_string()),
        ENV_BASE_URL => Some(uri.clone()),
        ENV_MAX_RETRIES => Some("0".to_string()),
        _ => None,
    })
    .build()
    .unwrap();

    assert_eq!(client.http().retry_config().max_retries, 0);
    let user = client.users().get("usr_1").await.unwrap();
    assert_eq!(user.email, "ama@example.com");
}
