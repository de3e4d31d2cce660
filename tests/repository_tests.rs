use chrono::{TimeZone, Utc};
use hustly_inventory::auth::{Session, User};
use hustly_inventory::error::Error;
use hustly_inventory::inventory::{
    ListingFilters, ListingPatch, ListingStatus, NewListing, SaleRecord,
};
use hustly_inventory::Hustly;
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::matchers::{any, body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn signed_in(server: &MockServer) -> Hustly {
    let hustly = Hustly::new(&server.uri(), "anon-key");
    hustly.auth().set_session(Some(Session::new(
        "user-token".to_string(),
        "refresh-token".to_string(),
        User {
            id: "user-1".to_string(),
            email: Some("seller@example.com".to_string()),
            phone: None,
            app_metadata: json!({}),
            user_metadata: json!({}),
            created_at: None,
            updated_at: None,
        },
        3600,
    )));
    hustly
}

fn row(overrides: Value) -> Value {
    let mut base = json!({
        "id": "1",
        "user_id": "user-1",
        "title": "Drill",
        "price": 45,
        "status": "draft",
        "photos": [],
        "keywords": []
    });
    if let (Value::Object(base), Value::Object(extra)) = (&mut base, overrides) {
        base.extend(extra);
    }
    base
}

async fn mount_get(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/listings"))
        .and(query_param("id", "eq.1"))
        .and(query_param("user_id", "eq.user-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn create_sets_owner_and_clears_the_cache() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/listings"))
        .and(header("authorization", "Bearer user-token"))
        .and(header("prefer", "return=representation"))
        .and(body_partial_json(json!({
            "title": "Drill",
            "price": 45.0,
            "status": "draft",
            "user_id": "user-1",
            "photos": [],
            "keywords": []
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([row(json!({}))])))
        .expect(1)
        .mount(&server)
        .await;

    let hustly = signed_in(&server);
    let filters = ListingFilters::default();
    hustly.cache().set("user-1", &filters, Vec::new()).await;

    let created = hustly
        .listings()
        .create(NewListing::new("Drill", 45.0))
        .await
        .unwrap();

    assert_eq!(created.id, "1");
    assert_eq!(created.status, ListingStatus::Draft);
    assert!(hustly.cache().get("user-1", &filters).await.is_none());
}

#[tokio::test]
async fn invalid_listing_is_rejected_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let repository = signed_in(&server).listings();

    let blank = repository.create(NewListing::new("  ", 10.0)).await;
    assert!(matches!(blank, Err(Error::Validation(_))));

    let negative = repository.create(NewListing::new("Lamp", -1.0)).await;
    assert!(matches!(negative, Err(Error::Validation(_))));

    let empty = repository.update("1", ListingPatch::default()).await;
    assert!(matches!(empty, Err(Error::Validation(_))));
}

#[tokio::test]
async fn update_sends_only_the_set_fields() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/listings"))
        .and(query_param("id", "eq.1"))
        .and(query_param("user_id", "eq.user-1"))
        .and(body_json(json!({ "price": 50.0, "brand": null })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row(json!({ "price": 50 }))])))
        .expect(1)
        .mount(&server)
        .await;

    let patch = ListingPatch {
        price: Some(50.0),
        brand: Some(None),
        ..Default::default()
    };
    let updated = signed_in(&server).listings().update("1", patch).await.unwrap();
    assert_eq!(updated.price, 50.0);
}

#[tokio::test]
async fn update_of_a_foreign_or_missing_row_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/listings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let patch = ListingPatch {
        title: Some("Cordless drill".to_string()),
        ..Default::default()
    };
    let result = signed_in(&server).listings().update("1", patch).await;
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn activating_stamps_the_listed_date_once() {
    let server = MockServer::start().await;
    mount_get(&server, json!([row(json!({ "listed_date": null }))])).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/listings"))
        .and(body_partial_json(json!({ "status": "active" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row(json!({ "status": "active" }))])))
        .expect(1)
        .mount(&server)
        .await;

    let listing = signed_in(&server)
        .listings()
        .set_status("1", ListingStatus::Active)
        .await
        .unwrap();
    assert_eq!(listing.status, ListingStatus::Active);

    let requests = server.received_requests().await.unwrap();
    let patch = requests
        .iter()
        .find(|r| r.method.to_string() == "PATCH")
        .unwrap()
        .body_json::<Value>()
        .unwrap();
    assert!(patch["listed_date"].is_string());
}

#[tokio::test]
async fn archive_does_not_touch_the_listed_date() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/listings"))
        .and(body_json(json!({ "status": "archived" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row(json!({ "status": "archived" }))])))
        .expect(1)
        .mount(&server)
        .await;

    let listing = signed_in(&server).listings().archive("1").await.unwrap();
    assert_eq!(listing.status, ListingStatus::Archived);
}

#[tokio::test]
async fn mark_sold_writes_the_sale_summary() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        json!([row(json!({
            "status": "active",
            "purchase_price": 10,
            "fees_paid": 5,
            "listed_date": "2024-03-01T00:00:00Z"
        }))]),
    )
    .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/listings"))
        .and(body_partial_json(json!({
            "status": "sold",
            "sold_price": 50.0,
            "net_profit": 35.0,
            "profit_margin": 70.0,
            "days_to_sell": 10
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row(json!({ "status": "sold", "sold_price": 50 }))])))
        .expect(1)
        .mount(&server)
        .await;

    let sale = SaleRecord::new(50.0, Utc.with_ymd_and_hms(2024, 3, 11, 9, 0, 0).unwrap());
    let sold = signed_in(&server).listings().mark_sold("1", sale).await.unwrap();
    assert_eq!(sold.status, ListingStatus::Sold);
    assert_eq!(sold.sold_price, Some(50.0));
}

#[tokio::test]
async fn get_returns_none_for_missing_rows() {
    let server = MockServer::start().await;
    mount_get(&server, json!([])).await;

    let listing = signed_in(&server).listings().get("1").await.unwrap();
    assert!(listing.is_none());
}

#[tokio::test]
async fn delete_is_scoped_and_reports_missing_rows() {
    let server = MockServer::start().await;
    let existing = Uuid::new_v4().to_string();
    let missing = Uuid::new_v4().to_string();

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/listings"))
        .and(query_param("id", format!("eq.{}", existing)))
        .and(query_param("user_id", "eq.user-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row(json!({ "id": existing }))])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/listings"))
        .and(query_param("id", format!("eq.{}", missing)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let repository = signed_in(&server).listings();
    repository.delete(&existing).await.unwrap();
    assert!(matches!(repository.delete(&missing).await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn writes_without_a_session_are_auth_errors() {
    let server = MockServer::start().await;
    let repository = Hustly::new(&server.uri(), "anon-key").listings();

    let result = repository.delete("1").await;
    assert!(matches!(result, Err(Error::Auth(_))));
}
