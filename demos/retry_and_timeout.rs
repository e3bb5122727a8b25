//! Example demonstrating retries, retry delays and timeouts.
//!
//! This example shows how to:
//! - Retry responses whose status matches the retry rules
//! - Use custom retry delays
//! - Share one timeout across all attempts, or restart it per attempt
//! - Load client defaults from a settings document
//! - Rewrite requests and responses with interceptors
//!
//! Run with: `cargo run --example retry_and_timeout`

use fetchwrap::{Client, Options, Request, RetryDelay, Settings};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("fetchwrap=debug,retry_and_timeout=info")
        .init();

    println!("=== Example 1: Retrying Server Errors ===");
    // httpbin answers 503 every time, so all attempts are used up
    let client = Client::builder()
        .base_url("https://httpbin.org/")?
        .retry(2)
        .retry_delay(RetryDelay::from_millis([200, 400])?)
        .build()?;

    match client.get("status/503").send().await {
        Ok(response) => println!("Success after {} attempts", response.attempts),
        Err(e) => {
            let attempts = e.response().map(|r| r.attempts).unwrap_or_default();
            println!("Failed with {:?} after {} attempts", e.status(), attempts);
        }
    }
    println!();

    println!("=== Example 2: Only Retrying Rate Limits ===");
    match client.get("status/500").retry_status([429]).send().await {
        Ok(_) => println!("Unexpected success"),
        Err(e) => println!(
            "500 was not retried: {} attempt(s)",
            e.response().map(|r| r.attempts).unwrap_or_default()
        ),
    }
    println!();

    println!("=== Example 3: Timeouts ===");
    // One window for the whole call, retries included
    match client
        .get("delay/3")
        .timeout(Duration::from_secs(1))
        .send()
        .await
    {
        Err(e) if e.is_timeout() => println!("Timed out: {}", e),
        other => println!("Unexpected: {:?}", other.map(|r| r.status)),
    }

    // A fresh window for every attempt
    let response = client
        .get("delay/1")
        .timeout(Duration::from_secs(5))
        .timeout_reset(true)
        .send()
        .await?;
    println!("Finished in {:?}", response.latency);
    println!();

    println!("=== Example 4: Settings Document ===");
    let settings: Settings = serde_json::from_str(
        r#"{
            "base_url": "https://httpbin.org/",
            "timeout_ms": 5000,
            "retry": 1,
            "retry_delay_ms": [250],
            "headers": { "user-agent": "fetchwrap-demo" },
            "query": { "source": "settings" }
        }"#,
    )?;
    let client = Client::builder()
        .options(Options::from_settings(settings)?)
        .before(|mut request: Request| {
            request
                .headers
                .insert("x-request-id", "demo-1".parse().expect("valid header"));
            request
        })
        .build()?;

    let response = client.get("anything/{name}").param("name", "demo").send().await?;
    println!("Sent to: {}", response.request.url);
    if let Some(echo) = response.body.as_json() {
        println!("Server saw headers: {}", echo["headers"]);
    }

    Ok(())
}
