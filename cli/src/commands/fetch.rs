//! Fetch command implementation

use crate::client::ApiClient;
use crate::output;
use anyhow::Result;
use clap::Args;

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Profiling job id returned by `launch`
    pub job_id: String,
}

pub async fn run(client: &ApiClient, args: FetchArgs) -> Result<()> {
    let payload = client
        .get("get_profiling_info", &[("profiling_id", args.job_id.as_str())])
        .await?;
    output::payload(&payload)
}
