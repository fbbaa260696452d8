use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use user_ingest::{source_from_path, MemorySink, Pipeline, PipelineConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let defaults = PipelineConfig::default();
    let matches = Command::new("ingest")
        .about("Ingest a user CSV (.csv, .csv.gz, .csv.zst) into an in-memory store")
        .arg(
            Arg::new("path")
                .long("path")
                .required(true)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("workers")
                .long("workers")
                .help("Concurrent sink writers (default 5)")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("batch-size")
                .long("batch-size")
                .help("Records per bulk insert (default 100)")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("queue-capacity")
                .long("queue-capacity")
                .help("Capacity of the intake and outcome queues (default 100)")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print the summary as JSON")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let path = matches
        .get_one::<PathBuf>("path")
        .ok_or_else(|| anyhow::anyhow!("Provide --path <file>"))?;
    let config = PipelineConfig::default()
        .with_workers(
            matches
                .get_one::<usize>("workers")
                .copied()
                .unwrap_or(defaults.workers),
        )
        .with_batch_size(
            matches
                .get_one::<usize>("batch-size")
                .copied()
                .unwrap_or(defaults.batch_size),
        )
        .with_queue_capacity(
            matches
                .get_one::<usize>("queue-capacity")
                .copied()
                .unwrap_or(defaults.queue_capacity),
        );

    let start = Instant::now();
    let sink = Arc::new(MemorySink::new());
    let reader = source_from_path(path).await?;
    let summary = Pipeline::new(sink.clone())
        .with_config(config)
        .run(reader)
        .await?;
    let elapsed = start.elapsed().as_secs_f64();

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "source={} rows={} added={} failed={} skipped={} duplicate={} lost={} batches={} \
             stored={}\nelapsed={:.1}s rows/sec={:.0}",
            path.display(),
            summary.rows_read,
            summary.added,
            summary.failed,
            summary.skipped,
            summary.duplicate,
            summary.lost,
            summary.batches,
            sink.len(),
            elapsed,
            summary.rows_read as f64 / elapsed
        );
    }
    Ok(())
}
