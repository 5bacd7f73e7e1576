use deskfs_core::{ApiErrorClass, Item, ItemKind, ItemRow, ItemType, TableClient, TableError};
use serde_json::json;
use wiremock::matchers::{body_json, header, headers, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sample_row(id: &str, name: &str, position: i64) -> serde_json::Value {
    json!({
        "tenant_id": "acme",
        "parent_path": "Docs",
        "id": id,
        "position": position,
        "name": name,
        "type": "file",
        "path": format!("Docs/{name}"),
        "modified": "2024-01-01",
        "icon": "file-text",
        "size": 3,
        "content": "abc"
    })
}

#[tokio::test]
async fn select_children_filters_by_tenant_and_parent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/fs_items"))
        .and(query_param("tenant_id", "eq.acme"))
        .and(query_param("parent_path", "eq.Docs"))
        .and(query_param("order", "position.asc"))
        .and(header("apikey", "test-key"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            sample_row("1", "A.txt", 0),
            {
                "tenant_id": "acme",
                "parent_path": "Docs",
                "id": "2",
                "position": 1,
                "name": "B",
                "type": "folder",
                "path": "Docs/B",
                "modified": "2024-01-02"
            }
        ])))
        .mount(&server)
        .await;

    let client = TableClient::new(&server.uri(), "test-key").unwrap();
    let rows = client.select_children("acme", "Docs").await.unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].name, "A.txt");
    assert_eq!(rows[0].size, Some(3));
    assert_eq!(rows[1].item_type, ItemType::Folder);

    let folder = rows[1].clone().into_item();
    assert_eq!(folder.kind, ItemKind::Folder);
    assert_eq!(folder.icon, "folder");
}

#[tokio::test]
async fn select_children_of_root_uses_empty_parent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/listings"))
        .and(query_param("parent_path", "eq."))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let client = TableClient::new(&server.uri(), "test-key")
        .unwrap()
        .with_table("listings");
    let rows = client.select_children("acme", "").await.unwrap();

    assert!(rows.is_empty());
}

#[tokio::test]
async fn non_array_response_is_not_retryable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/fs_items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "rows": [] })))
        .mount(&server)
        .await;

    let client = TableClient::new(&server.uri(), "test-key").unwrap();
    let err = client.select_children("acme", "Docs").await.unwrap_err();

    assert!(matches!(err, TableError::Request(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn upsert_rows_posts_merge_duplicates() {
    let server = MockServer::start().await;
    let row: ItemRow = serde_json::from_value(sample_row("1", "A.txt", 0)).unwrap();

    Mock::given(method("POST"))
        .and(path("/rest/v1/fs_items"))
        .and(query_param("on_conflict", "tenant_id,parent_path,id"))
        .and(headers(
            "prefer",
            vec!["resolution=merge-duplicates", "return=minimal"],
        ))
        .and(body_json(json!([sample_row("1", "A.txt", 0)])))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let client = TableClient::new(&server.uri(), "test-key").unwrap();
    client.upsert_rows(&[row]).await.unwrap();
    client.upsert_rows(&[]).await.unwrap();
}

#[tokio::test]
async fn delete_children_except_excludes_kept_ids() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/fs_items"))
        .and(query_param("tenant_id", "eq.acme"))
        .and(query_param("parent_path", "eq.Docs"))
        .and(query_param("id", "not.in.(\"1\",\"2\")"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = TableClient::new(&server.uri(), "test-key").unwrap();
    client
        .delete_children_except("acme", "Docs", &["1", "2"])
        .await
        .unwrap();
}

#[tokio::test]
async fn delete_row_reports_whether_a_row_was_removed() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/fs_items"))
        .and(query_param("id", "eq.1"))
        .and(header("prefer", "return=representation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([sample_row("1", "A.txt", 0)])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/fs_items"))
        .and(query_param("id", "eq.missing"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let client = TableClient::new(&server.uri(), "test-key").unwrap();
    assert!(client.delete_row("acme", "Docs", "1").await.unwrap());
    assert!(!client.delete_row("acme", "Docs", "missing").await.unwrap());
}

#[tokio::test]
async fn rpc_calls_send_named_arguments() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/rewrite_path_prefix"))
        .and(body_json(json!({
            "p_tenant_id": "acme",
            "p_old_prefix": "A",
            "p_new_prefix": "C"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(4)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/delete_subtree"))
        .and(body_json(json!({
            "p_tenant_id": "acme",
            "p_prefix": "C"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(2)))
        .mount(&server)
        .await;

    let client = TableClient::new(&server.uri(), "test-key").unwrap();
    assert_eq!(client.rewrite_prefix("acme", "A", "C").await.unwrap(), 4);
    assert_eq!(client.delete_subtree("acme", "C").await.unwrap(), 2);
}

#[tokio::test]
async fn server_errors_are_retryable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/fs_items"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let client = TableClient::new(&server.uri(), "test-key").unwrap();
    let err = client.select_children("acme", "").await.unwrap_err();

    assert!(matches!(err, TableError::Api { .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn constraint_conflicts_are_not_retryable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/fs_items"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint \"fs_items_sibling_name\""
        })))
        .expect(1)
        .mount(&server)
        .await;

    let row: ItemRow = serde_json::from_value(sample_row("1", "A.txt", 0)).unwrap();
    let client = TableClient::new(&server.uri(), "test-key").unwrap();
    let err = client.upsert_rows(&[row]).await.unwrap_err();

    assert_eq!(err.classification(), Some(ApiErrorClass::Conflict));
    assert!(!err.is_retryable());
}

#[test]
fn row_round_trips_items() {
    let row: ItemRow = serde_json::from_value(sample_row("7", "notes.txt", 2)).unwrap();
    let item: Item = row.clone().into_item();
    assert_eq!(item.path, "Docs/notes.txt");
    assert_eq!(
        item.kind,
        ItemKind::File {
            size: 3,
            content: Some("abc".into())
        }
    );

    let back = ItemRow::from_item("acme", "Docs", 2, &item);
    assert_eq!(back, row);
}
