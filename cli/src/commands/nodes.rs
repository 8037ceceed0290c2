//! Nodes command implementation

use crate::client::ApiClient;
use crate::output;
use anyhow::{Context, Result};
use colored::Colorize;
use vantage_shared::NodeConnection;

pub async fn run(client: &ApiClient) -> Result<()> {
    let body = client.get("nodes", &[]).await?;
    let nodes: Vec<NodeConnection> =
        serde_json::from_value(body["result"].clone()).context("Unexpected nodes response")?;

    if nodes.is_empty() {
        output::info("No connected nodes.");
        return Ok(());
    }

    println!("{} node(s):", nodes.len());
    for node in nodes {
        println!(
            "  {} {} since {}",
            node.node_id.to_string().bold(),
            node.endpoint,
            node.connected_at
        );
    }
    Ok(())
}
