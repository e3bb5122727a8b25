//! Example demonstrating error handling.
//!
//! This example shows how to:
//! - Handle responses whose status is not a success
//! - Inspect the decoded body and request of a failed call
//! - Deal with deserialization failures
//! - Tell network errors, timeouts and aborts apart
//!
//! Run with: `cargo run --example error_handling`

use fetchwrap::{CancellationToken, Client, Error};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Post {
    id: u32,
    title: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("fetchwrap=info")
        .init();

    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")?
        .build()?;

    println!("=== Example 1: Handling HTTP Errors ===");
    // A missing resource answers 404, which is not in the default success rules
    match client.get("/posts/999999").send_json::<Post>().await {
        Ok(response) => println!("Success: {:?}", response.body),
        Err(Error::Status { response }) => {
            println!("HTTP Error!");
            println!("  Status: {}", response.status);
            println!("  Is client error (4xx): {}", response.status.is_client_error());
            println!("  Decoded body: {:?}", response.body);
            println!("  Request: {} {}", response.request.method, response.request.url);
            println!("  Content-Type: {:?}", response.header("content-type"));
        }
        Err(e) => println!("Other error: {}", e),
    }
    println!();

    println!("=== Example 2: Accepting More Statuses ===");
    let response = client.get("/posts/999999").status([2, 404]).send().await?;
    println!("Accepted status {} with body {:?}", response.status, response.body);
    println!();

    println!("=== Example 3: Handling Deserialization Errors ===");
    #[derive(Deserialize)]
    #[allow(dead_code)]
    struct WrongSchema {
        nonexistent_field: String,
    }

    match client.get("/posts/1").send_json::<WrongSchema>().await {
        Ok(_) => println!("Unexpected success"),
        Err(Error::DeserializationFailed {
            raw_response,
            reason,
            status,
            ..
        }) => {
            println!("Deserialization Failed!");
            println!("  Status: {}", status);
            println!("  Reason: {}", reason);
            println!(
                "  Raw response (first 200 chars): {}",
                raw_response.chars().take(200).collect::<String>()
            );
        }
        Err(e) => println!("Other error: {}", e),
    }
    println!();

    println!("=== Example 4: Handling Network Errors ===");
    let bad_client = Client::builder()
        .base_url("https://this-domain-does-not-exist-12345.com")?
        .retry(3)
        .build()?;

    // Network errors are returned right away, never retried
    match bad_client.get("/").send().await {
        Ok(_) => println!("Unexpected success"),
        Err(e @ Error::Network { .. }) => {
            println!("Network Error!");
            println!("  Error: {}", e);
            println!("  Request URL: {:?}", e.request().map(|r| r.url.as_str()));
            println!("  Has response: {}", e.response().is_some());
        }
        Err(e) => println!("Other error: {}", e),
    }
    println!();

    println!("=== Example 5: Timeouts and Aborts ===");
    match client
        .get("/posts")
        .timeout(Duration::from_millis(1))
        .send()
        .await
    {
        Err(e) if e.is_timeout() => println!("Timed out: {}", e),
        other => println!("Finished before the timeout: {:?}", other.map(|r| r.status)),
    }

    let token = CancellationToken::new();
    token.cancel();
    match client.get("/posts").signal(token).send().await {
        Err(e @ Error::Aborted { .. }) => println!("Aborted: {}", e),
        other => println!("Unexpected: {:?}", other.map(|r| r.status)),
    }

    Ok(())
}
