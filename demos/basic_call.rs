//! Basic example demonstrating simple GET and POST requests.
//!
//! This example shows how to:
//! - Create a client with a base URL and default headers
//! - Fill path placeholders and add query parameters
//! - Send JSON bodies and decode JSON responses into types
//! - Look at the decoded payload of other content types
//!
//! Run with: `cargo run --example basic_call`

use fetchwrap::{Client, Error, Payload};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Post {
    #[serde(rename = "userId")]
    user_id: u32,
    id: u32,
    title: String,
    body: String,
}

#[derive(Debug, Serialize)]
struct NewPost {
    title: String,
    body: String,
    #[serde(rename = "userId")]
    user_id: u32,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("fetchwrap=debug,basic_call=info")
        .init();

    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com/")?
        .default_header("Accept", "application/json")?
        .build()?;

    println!("=== GET Request Example ===");
    let response = client
        .get("posts/{id}")
        .param("id", 1)
        .send_json::<Post>()
        .await?;

    println!("Post ID: {}", response.body.id);
    println!("Title: {}", response.body.title);
    println!("Request URL: {}", response.request.url);
    println!("Request latency: {:?}", response.latency);
    println!("Status code: {}", response.status);
    println!();

    println!("=== Query Parameters ===");
    let response = client
        .get("posts")
        .query("userId", 1)
        .send_json::<Vec<Post>>()
        .await?;
    println!("User 1 wrote {} posts", response.body.len());
    println!();

    println!("=== POST Request Example ===");
    let new_post = NewPost {
        title: "My New Post".to_string(),
        body: "This is the content of my new post!".to_string(),
        user_id: 1,
    };

    let response = client
        .post("posts")
        .json(&new_post)
        .send_json::<Post>()
        .await?;

    println!("Created post ID: {}", response.body.id);
    println!("Title: {}", response.body.title);
    println!();

    println!("=== Untyped Payloads ===");
    let response = client.get("posts/1").send().await?;
    match &response.body {
        Payload::Json(value) => println!("JSON with keys: {:?}", value.as_object().map(|o| o.len())),
        Payload::Text(text) => println!("Text: {}", text),
        Payload::Blob(blob) => println!("{} bytes of {}", blob.len(), blob.content_type()),
        other => println!("Other payload: {:?}", other),
    }
    println!("Content-Type: {:?}", response.header("content-type"));
    println!("Was retried: {}", response.was_retried());

    Ok(())
}
