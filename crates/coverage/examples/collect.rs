//! Collect JS and CSS coverage for one page load
//!
//! ```text
//! chrome --remote-debugging-port=9222 --headless
//! CDP_URL=ws://localhost:9222/devtools/browser/<id> cargo run --example collect -- https://example.com
//! ```

use cdp::{CDPClient, CDPSession};
use coverage::{Coverage, CoverageEntry, CssCoverageOptions, JsCoverageOptions};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn print_entries(kind: &str, entries: &[CoverageEntry]) {
    for entry in entries {
        let total = entry.text.len();
        let used = entry.used_len();
        println!(
            "[{}] {} - {}/{} bytes used ({} ranges)",
            kind,
            entry.url,
            used,
            total,
            entry.ranges.len()
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cdp_url = std::env::var("CDP_URL")
        .unwrap_or_else(|_| "ws://localhost:9222/devtools/browser".to_string());
    let page_url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://example.com".to_string());

    println!("Connecting to Chrome at: {}", cdp_url);
    let client = CDPClient::connect(&cdp_url).await?;
    let session = Arc::new(CDPSession::create(client.clone(), "about:blank").await?);

    let coverage = Coverage::new(session.clone());
    coverage
        .start_js_coverage(JsCoverageOptions::default())
        .await?;
    coverage
        .start_css_coverage(CssCoverageOptions::default())
        .await?;

    session.navigate(&page_url).await?;
    tokio::time::sleep(std::time::Duration::from_secs(3)).await;

    let js = coverage.stop_js_coverage().await?;
    let css = coverage.stop_css_coverage().await?;
    print_entries("js", &js);
    print_entries("css", &css);

    client.close().await?;
    Ok(())
}
