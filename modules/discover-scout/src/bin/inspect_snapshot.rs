//! Diagnostic tool: run the extractor and record builder over a saved
//! Discover page, to see what a markup change does without a browser.
//!
//! Usage: cargo run --bin inspect_snapshot -- <page.html> <top|tech|finance>

use anyhow::{bail, Context, Result};
use chrono::Utc;

use discover_common::{Config, Topic};
use discover_scout::builder::RecordBuilder;
use discover_scout::extractor::extract_from_html;

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let (Some(path), Some(topic)) = (args.next(), args.next()) else {
        bail!("usage: inspect_snapshot <page.html> <top|tech|finance>");
    };
    let topic: Topic = topic.parse()?;
    let html = std::fs::read_to_string(&path).with_context(|| format!("Failed to read {path}"))?;
    let config = Config::from_env(None)?;

    let extraction = extract_from_html(&html, topic, &config.extract);
    println!(
        "Strategy: {}   anchors: {}   candidates: {}\n",
        extraction.strategy.map(|s| s.name()).unwrap_or("none"),
        extraction.anchors,
        extraction.candidates.len()
    );
    for (i, c) in extraction.candidates.iter().enumerate() {
        println!("{:>3}. {}", i + 1, c.title);
        println!("     href:    {}", c.href);
        println!("     time:    {:?}   sources: {:?}", c.time_text, c.source_count);
    }

    let records = RecordBuilder::new(&config.refresh, &config.extract).build(topic, &extraction.candidates, Utc::now());
    println!("\n{} records after validation and per-topic cap:\n", records.len());
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}
