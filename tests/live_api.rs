//! API tests against a running server backed by PostgreSQL
//!
//! Start the server with a fresh database, then run:
//! `cargo test --test live_api -- --ignored --test-threads=1`

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:5000/api";

/// Unique email per test run so the suite can be re-run on the same database
fn unique_email(prefix: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("Clock before epoch")
        .as_nanos();
    format!("{}-{}@example.com", prefix, nanos)
}

/// Helper to register a reader and get a token
async fn get_auth_token(client: &Client, email: &str) -> String {
    let response = client
        .post(format!("{}/register", BASE_URL))
        .json(&json!({
            "name": "Live Reader",
            "email": email,
            "phone": "555-0100",
            "password": "secret"
        }))
        .send()
        .await
        .expect("Failed to send register request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = client
        .post(format!("{}/login", BASE_URL))
        .json(&json!({ "email": email, "password": "secret" }))
        .send()
        .await
        .expect("Failed to send login request");

    let body: Value = response.json().await.expect("Failed to parse login response");
    body["token"].as_str().expect("No token in response").to_string()
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_ready_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/ready", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
#[ignore]
async fn test_duplicate_registration() {
    let client = Client::new();
    let email = unique_email("dup");
    get_auth_token(&client, &email).await;

    let response = client
        .post(format!("{}/register", BASE_URL))
        .json(&json!({
            "name": "Again",
            "email": email,
            "phone": "1",
            "password": "p"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore]
async fn test_borrow_and_return_against_postgres() {
    let client = Client::new();
    let token = get_auth_token(&client, &unique_email("borrow")).await;

    let response = client
        .get(format!("{}/books", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let books: Value = response.json().await.expect("Failed to parse response");
    let book_id = books[0]["id"].as_i64().expect("No available book");

    let borrow = || {
        client
            .post(format!("{}/borrow", BASE_URL))
            .bearer_auth(&token)
            .json(&json!({ "book_id": book_id }))
            .send()
    };

    let response = borrow().await.expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = borrow().await.expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .post(format!("{}/return", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "book_id": book_id }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
}

#[tokio::test]
#[ignore]
async fn test_concurrent_borrows_against_postgres() {
    let client = Client::new();

    let mut tokens = Vec::new();
    for i in 0..8 {
        tokens.push(get_auth_token(&client, &unique_email(&format!("race{}", i))).await);
    }

    let response = client
        .get(format!("{}/books", BASE_URL))
        .bearer_auth(&tokens[0])
        .send()
        .await
        .expect("Failed to send request");
    let books: Value = response.json().await.expect("Failed to parse response");
    let book_id = books[0]["id"].as_i64().expect("No available book");

    let handles: Vec<_> = tokens
        .iter()
        .cloned()
        .map(|token| {
            let client = client.clone();
            tokio::spawn(async move {
                let status = client
                    .post(format!("{}/borrow", BASE_URL))
                    .bearer_auth(&token)
                    .json(&json!({ "book_id": book_id }))
                    .send()
                    .await
                    .expect("Failed to send request")
                    .status();
                (token, status)
            })
        })
        .collect();

    let mut winners = Vec::new();
    for handle in handles {
        let (token, status) = handle.await.expect("Borrow task panicked");
        if status == StatusCode::CREATED {
            winners.push(token);
        }
    }
    assert_eq!(winners.len(), 1);

    // Put the book back for the next run
    client
        .post(format!("{}/return", BASE_URL))
        .bearer_auth(&winners[0])
        .json(&json!({ "book_id": book_id }))
        .send()
        .await
        .expect("Failed to send request");
}
