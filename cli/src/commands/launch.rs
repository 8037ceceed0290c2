//! Launch command implementation

use crate::client::ApiClient;
use crate::output;
use anyhow::{Context, Result};
use clap::Args;
use vantage_shared::utils::parse_duration;
use vantage_shared::Pid;

#[derive(Args, Debug)]
pub struct LaunchArgs {
    /// Node to profile on
    #[arg(short, long)]
    pub node: String,

    /// Process ID on that node
    #[arg(short, long)]
    pub pid: Pid,

    /// Profiling duration (e.g. 30s, 5m)
    #[arg(short, long, default_value = "30s")]
    pub duration: String,
}

pub async fn run(client: &ApiClient, args: LaunchArgs) -> Result<()> {
    let duration = parse_duration(&args.duration)
        .with_context(|| format!("Invalid duration '{}'", args.duration))?;
    let pid = args.pid.to_string();
    let secs = duration.as_secs().to_string();

    let body = client
        .get(
            "launch_profiling",
            &[
                ("node_id", args.node.as_str()),
                ("pid", pid.as_str()),
                ("duration", secs.as_str()),
            ],
        )
        .await
        .context("Launch failed")?;
    let job_id = body["result"]
        .as_str()
        .context("Coordinator response is missing the job id")?;

    output::success(&format!(
        "Profiling pid {} on {} for {}s",
        args.pid, args.node, secs
    ));
    println!("{}", job_id);
    Ok(())
}
