//! showerpool CLI: run job batches and stage pipelines on a bounded pool.

use showerpool::config::Config;
use showerpool::jobs::load_jobs;
use showerpool::logscan::{Markers, Verdict, scan};
use showerpool::model::RunSummary;
use showerpool::pipeline::{Pipeline, discover_inputs, run_pipeline};
use showerpool::pool::{CommandLauncher, CommandPool, PoolConfig};
use showerpool::source::Source;
use showerpool::telemetry::{TelemetryConfig, init_telemetry};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "showerpool", about = "Bounded local process pool for simulation batches")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every job of a job file, a bounded number at a time
    Run {
        /// Job file with `key command...` lines, or `-` for stdin
        jobs: PathBuf,
        #[command(flatten)]
        pool: PoolArgs,
    },
    /// Push every input file through a stage pipeline
    Pipeline {
        /// Pipeline definition (TOML)
        definition: PathBuf,
        /// Directory holding one sub-directory per energy bin
        #[arg(long)]
        in_dir: PathBuf,
        /// Energy bins to process (default: every bin directory)
        #[arg(long = "bin")]
        bins: Vec<String>,
        /// Run only these stages (default: those enabled in the definition)
        #[arg(long = "stage")]
        stages: Vec<String>,
        #[command(flatten)]
        pool: PoolArgs,
    },
    /// Report failed tasks from the `.err` logs in a directory
    Scan {
        /// Log directory to inspect
        log_dir: PathBuf,
        /// Print verdicts as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct PoolArgs {
    /// Maximum concurrent tasks [env: SHOWERPOOL_CAPACITY]
    #[arg(long)]
    capacity: Option<usize>,
    /// Existing directory for per-task stdout/stderr logs, required [env: SHOWERPOOL_LOG_DIR]
    #[arg(long)]
    log_dir: Option<PathBuf>,
    /// Seconds between scans of running tasks [env: SHOWERPOOL_POLL_SECS]
    #[arg(long)]
    poll_secs: Option<u64>,
    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,
}

impl PoolArgs {
    fn pool_config(&self, config: &Config) -> anyhow::Result<PoolConfig> {
        let mut pool = config.pool_config();
        if let Some(capacity) = self.capacity {
            pool.capacity = capacity;
        }
        if let Some(ref dir) = self.log_dir {
            pool.log_dir = Some(dir.clone());
        }
        if let Some(secs) = self.poll_secs {
            pool.poll_interval = Duration::from_secs(secs);
        }
        match pool.log_dir {
            Some(ref dir) => ensure_dir(dir)?,
            None => anyhow::bail!("a log directory is required: pass --log-dir or set SHOWERPOOL_LOG_DIR"),
        }
        Ok(pool)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "showerpool".to_string(),
        default_level: config.log_level.clone(),
    })?;

    match cli.command {
        Command::Run { jobs, pool } => cmd_run(&config, jobs, pool).await,
        Command::Pipeline {
            definition,
            in_dir,
            bins,
            stages,
            pool,
        } => cmd_pipeline(&config, definition, in_dir, bins, stages, pool).await,
        Command::Scan { log_dir, json } => cmd_scan(log_dir, json),
    }
}

async fn cmd_run(config: &Config, jobs: PathBuf, args: PoolArgs) -> anyhow::Result<()> {
    let pool_config = args.pool_config(config)?;
    let items = load_jobs(&jobs)?;

    let mut pool = CommandPool::new(CommandLauncher::new(), Source::from_vec(items), pool_config)?;
    let summary = pool.run().await?;
    print_summary(&summary, args.json)
}

async fn cmd_pipeline(
    config: &Config,
    definition: PathBuf,
    in_dir: PathBuf,
    bins: Vec<String>,
    stages: Vec<String>,
    args: PoolArgs,
) -> anyhow::Result<()> {
    let pool_config = args.pool_config(config)?;

    let mut pipeline = Pipeline::load(&definition)?;
    if !stages.is_empty() {
        pipeline.restrict_to(&stages)?;
    }
    if let Some(ref dir) = pool_config.log_dir {
        pipeline = pipeline.with_log_dir(dir);
    }

    let inputs = discover_inputs(&in_dir, &bins)?;
    let summary = run_pipeline(Arc::new(pipeline), inputs, pool_config).await?;
    print_summary(&summary, args.json)
}

fn cmd_scan(log_dir: PathBuf, json: bool) -> anyhow::Result<()> {
    ensure_dir(&log_dir)?;
    let verdicts = scan(&log_dir, &Markers::default())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&verdicts)?);
        return Ok(());
    }

    let mut failed = 0;
    for v in &verdicts {
        match &v.verdict {
            Verdict::Clean => {}
            Verdict::Failed { marker } => {
                failed += 1;
                println!("FAILED   {:<30}  {marker}", v.key);
            }
            Verdict::Unknown { last_line } => {
                println!("UNKNOWN  {:<30}  {last_line}", v.key);
            }
        }
    }
    println!("\n{} log(s), {} failed", verdicts.len(), failed);
    Ok(())
}

fn print_summary(summary: &RunSummary, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        println!("{summary}");
    }
    Ok(())
}

fn ensure_dir(dir: &Path) -> anyhow::Result<()> {
    if !dir.is_dir() {
        anyhow::bail!("log directory {} does not exist", dir.display());
    }
    Ok(())
}
