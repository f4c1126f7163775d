// ABOUTME: Command-line host for the eligibility batch widget
// ABOUTME: Prompts for confirmation, launches the batch and renders its progress

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use eligibility_batch::config::Config;
use eligibility_batch::remote::{BatchApi, RecordApi, RemoteClient};
use eligibility_batch::tracker::{BatchWidget, WidgetEvent};

#[derive(Parser)]
#[command(name = "eligibility-batch")]
#[command(about = "Launch an eligibility batch job and track it to completion", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Override the batch API base URL
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recalculate eligibility for the grouping key of a record
    Run {
        /// Record whose grouping key selects the batch
        #[arg(long)]
        record_id: String,
        /// Number of records processed per batch chunk
        #[arg(long)]
        batch_size: Option<String>,
        /// Optional filter condition passed to the batch
        #[arg(long, default_value = "")]
        filter: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Print the current status of a batch job
    Status {
        #[arg(long)]
        job_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(url) = cli.api_url {
        config.api.base_url = url;
        config.validate()?;
    }

    let client = Arc::new(RemoteClient::new(
        config.api.base_url.clone(),
        config.request_timeout(),
    )?);

    match cli.command {
        Commands::Run {
            record_id,
            batch_size,
            filter,
            yes,
        } => run_batch(&config, client, &record_id, batch_size, filter, yes).await,
        Commands::Status { job_id } => {
            let status = client.get_batch_status(&job_id).await?;
            println!("Job:       {}", job_id);
            println!("Status:    {}", status.status);
            println!(
                "Progress:  {}/{} ({:.0}%)",
                status.items_processed,
                status.items_total,
                status.progress_percent()
            );
            println!("Errors:    {}", status.error_count);
            if let Some(extended) = status.extended_status.filter(|s| !s.is_empty()) {
                println!("Details:   {}", extended);
            }
            Ok(())
        }
    }
}

async fn run_batch(
    config: &Config,
    client: Arc<RemoteClient>,
    record_id: &str,
    batch_size: Option<String>,
    filter: String,
    yes: bool,
) -> Result<()> {
    let mut widget = BatchWidget::new(
        client.clone(),
        config.tracker_settings(),
        config.defaults.batch_size,
    );

    let grouping_key = client
        .fetch_record_field(record_id, &config.defaults.record_field)
        .await;
    widget.dispatch(WidgetEvent::GroupingKeyLoaded(grouping_key));
    if widget.state().job.is_errored {
        anyhow::bail!("{}", widget.state().job.error_message());
    }

    if let Some(size) = batch_size {
        widget.dispatch(WidgetEvent::BatchSizeChanged(size));
    }
    widget.dispatch(WidgetEvent::FilterChanged(filter));
    widget.dispatch(WidgetEvent::OpenModal);
    if !widget.state().modal_open {
        let err = widget.state().batch_size().err();
        anyhow::bail!(
            "{}",
            err.map(|e| e.to_string())
                .unwrap_or_else(|| "Batch modal could not be opened".to_string())
        );
    }

    let state = widget.state();
    let grouping_key = state.grouping_key.clone().unwrap_or_default();
    let confirmed = yes
        || Confirm::new()
            .with_prompt(format!(
                "Recalculate eligibility for '{}' (batch size {}, filter '{}')?",
                grouping_key, state.batch_size_input, state.filter_condition
            ))
            .default(true)
            .interact()
            .context("Failed to read confirmation")?;
    if !confirmed {
        widget.dispatch(WidgetEvent::Cancel);
        println!("Cancelled");
        return Ok(());
    }

    widget.dispatch(WidgetEvent::Submit);

    let progress = ProgressBar::new(100);
    progress.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40}] {pos:>3}% {msg}")?.progress_chars("=> "),
    );
    progress.set_message(widget.state().button_label());

    let outcome = widget
        .run_until_settled(|state| {
            progress.set_position(state.job.progress_percent.round() as u64);
            progress.set_message(state.button_label());
        })
        .await;

    match outcome {
        Ok(job_id) => {
            progress.finish_with_message(format!("Batch {} completed", job_id));
            Ok(())
        }
        Err(err) => {
            progress.abandon_with_message("Batch failed");
            widget.dispatch(WidgetEvent::CloseModal);
            Err(err.into())
        }
    }
}
