//! Wait command implementation

use crate::client::ApiClient;
use crate::commands::{fetch, status};
use crate::output;
use anyhow::{bail, Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};
use vantage_shared::utils::parse_duration;
use vantage_shared::JobStatus;

#[derive(Args, Debug)]
pub struct WaitArgs {
    /// Profiling job id returned by `launch`
    pub job_id: String,

    /// Poll interval
    #[arg(long, default_value = "1s")]
    pub interval: String,

    /// Give up after this long (e.g. 10m); waits forever if unset
    #[arg(long)]
    pub timeout: Option<String>,

    /// Only report the final status, do not print the payload
    #[arg(long)]
    pub no_fetch: bool,
}

pub async fn run(client: &ApiClient, args: WaitArgs) -> Result<()> {
    let interval = parse_duration(&args.interval).context("Invalid --interval")?;
    let interval = interval.max(Duration::from_millis(100));
    let deadline = match &args.timeout {
        Some(t) => Some(Instant::now() + parse_duration(t).context("Invalid --timeout")?),
        None => None,
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")?);
    spinner.set_message(format!("Waiting for {}", args.job_id));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let outcome = loop {
        match status::fetch_status(client, &args.job_id).await {
            Ok(JobStatus::Pending) => {}
            other => break other,
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            spinner.finish_and_clear();
            bail!("Timed out waiting for {}", args.job_id);
        }
        tokio::time::sleep(interval).await;
    };
    spinner.finish_and_clear();

    match outcome? {
        JobStatus::Finished => {
            output::success(&format!("{} finished", args.job_id));
            if args.no_fetch {
                return Ok(());
            }
            fetch::run(
                client,
                fetch::FetchArgs {
                    job_id: args.job_id,
                },
            )
            .await
        }
        JobStatus::Error { error } => bail!("{} failed: {}", args.job_id, error),
        JobStatus::Pending => unreachable!("loop only exits on a terminal status"),
    }
}
