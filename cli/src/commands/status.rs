//! Status command implementation

use crate::client::ApiClient;
use crate::output;
use anyhow::{Context, Result};
use clap::Args;
use vantage_shared::JobStatus;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Profiling job id returned by `launch`
    pub job_id: String,
}

pub(crate) async fn fetch_status(client: &ApiClient, job_id: &str) -> Result<JobStatus> {
    let body = client
        .get("check_profiling_status", &[("profiling_id", job_id)])
        .await?;
    serde_json::from_value(body["result"].clone()).context("Unexpected status response")
}

pub async fn run(client: &ApiClient, args: StatusArgs) -> Result<()> {
    let status = fetch_status(client, &args.job_id).await?;
    println!("{} {}", args.job_id, output::status_label(&status));
    if let JobStatus::Error { error } = &status {
        output::warning(error);
    }
    Ok(())
}
