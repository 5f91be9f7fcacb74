//! Basic SDK usage example.
//!
//! Connects with Basic auth, lists recent high-priority incidents, counts
//! open incidents per state and looks up the connecting user.
//!
//! Run with:
//! SERVICENOW_INSTANCE_URL=https://dev12345.service-now.com \
//! SERVICENOW_USERNAME=admin SERVICENOW_PASSWORD=... \
//! cargo run --example basic_usage

use nowbridge_sdk::{NowClient, NowError, NowResult, QueryDescriptor};
use std::time::Duration;

fn env(key: &str) -> NowResult<String> {
    std::env::var(key).map_err(|_| NowError::invalid_request(format!("{} is not set", key)))
}

#[tokio::main]
async fn main() -> NowResult<()> {
    // Initialize tracing for debug output
    tracing_subscriber::fmt::init();

    let username = env("SERVICENOW_USERNAME")?;
    let client = NowClient::builder()
        .base_url(env("SERVICENOW_INSTANCE_URL")?)
        .basic_auth(username.clone(), env("SERVICENOW_PASSWORD")?)
        .timeout(Duration::from_secs(30))
        .build()?;

    println!("Listing priority 1 incidents...");
    let incidents = client
        .table()
        .query(
            QueryDescriptor::new("incident")
                .query("active=true^priority=1")
                .fields(["number", "short_description", "state"])
                .order_by("-sys_updated_on")
                .limit(5),
        )
        .await?;
    println!("Found {} incidents", incidents.count);

    for incident in &incidents.records {
        println!(
            "  {}: {}",
            incident.get("number").and_then(|v| v.as_str()).unwrap_or("?"),
            incident
                .get("short_description")
                .and_then(|v| v.as_str())
                .unwrap_or("")
        );
    }

    println!("\nOpen incidents by state...");
    let stats = client
        .stats()
        .aggregate("incident", "state", "COUNT", Some("active=true"))
        .await?;
    println!("{}", serde_json::to_string_pretty(&stats).unwrap_or_default());

    println!("\nLooking up {}...", username);
    match client.directory().get_user(&username).await {
        Ok(user) => println!(
            "  {} <{}>",
            user.get("name").and_then(|v| v.as_str()).unwrap_or(&username),
            user.get("email").and_then(|v| v.as_str()).unwrap_or("")
        ),
        Err(e) => println!("  Lookup failed ({}): {}", e.kind(), e.message()),
    }

    Ok(())
}
