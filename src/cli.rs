use crate::{
    config::Config,
    export::{DirSaver, ExportFormat, ExportRequester},
    feedback::send_feedback,
    pipeline::{JobOutput, Pipeline},
    resolver::Resolution,
    schedule::TokioScheduler,
    submit::payload_from_path,
    transport::{HttpTransport, Transport},
    util::{ensure_dir, now_rfc3339},
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "pii-check")]
#[command(about = "Submit documents for PII scanning, follow the job, fetch reports and redacted exports")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./pii-check.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override server.base_url.
    #[arg(long)]
    pub server: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload a file, wait for the scan and print its detections.
    Scan {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Also fetch an export once the report is resolved.
        #[arg(long, value_enum)]
        export: Option<ExportFormat>,
    },
    /// Follow an existing job until it settles.
    Status {
        #[arg(long)]
        job_id: String,
    },
    Report {
        #[arg(long)]
        document_id: String,
    },
    Export {
        #[arg(long)]
        document_id: String,
        #[arg(long, value_enum, default_value = "redacted")]
        format: ExportFormat,
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    Feedback {
        #[arg(long)]
        message: String,
    },
}

pub async fn dispatch(args: Args) -> Result<()> {
    let cfg_path = resolve_config_path(args.config.as_deref())?;
    let mut cfg = Config::load(&cfg_path)?;
    if let Some(server) = &args.server {
        cfg.server.base_url = server.clone();
    }

    let _guard = init_logging(&args, &cfg, resolve_log_path(&cfg).as_deref())?;
    if cfg.debug.dump_effective_config {
        info!("effective config:\n{}", toml::to_string(&cfg).unwrap_or_default());
    }

    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&cfg)?);

    match &args.cmd {
        Command::Scan {
            input,
            out_dir,
            export,
        } => scan(&cfg, transport, input, out_dir.as_deref(), *export).await,
        Command::Status { job_id } => status(&cfg, transport, job_id).await,
        Command::Report { document_id } => report(transport, document_id).await,
        Command::Export {
            document_id,
            format,
            out_dir,
        } => {
            let out_root = resolve_out_dir(&cfg, out_dir.as_deref());
            export_document(transport, document_id, *format, &out_root).await
        }
        Command::Feedback { message } => {
            let ack = send_feedback(transport.as_ref(), message).await?;
            println!("{}", serde_json::to_string_pretty(&ack)?);
            Ok(())
        }
    }
}

fn resolve_config_path(user: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = user {
        return Ok(p.to_path_buf());
    }
    let default = PathBuf::from("pii-check.toml");
    if default.exists() {
        Ok(default)
    } else {
        Ok(PathBuf::from("pii-check.example.toml"))
    }
}

fn resolve_out_dir(cfg: &Config, user: Option<&Path>) -> PathBuf {
    user.map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&cfg.output.out_dir))
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries the JSON summaries, so logs go to stderr.
    let stderr_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }

    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }

    Some(PathBuf::from(&cfg.output.out_dir).join("pii-check.log"))
}

/// Cancels the pipeline's session when Ctrl-C arrives.
fn cancel_on_ctrl_c(pipeline: &Pipeline) {
    let token = pipeline.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted; cancelling session");
            token.cancel();
        }
    });
}

async fn scan(
    cfg: &Config,
    transport: Arc<dyn Transport>,
    input: &Path,
    out_override: Option<&Path>,
    export: Option<ExportFormat>,
) -> Result<()> {
    let upload = payload_from_path(input).await?;

    let pipeline = Pipeline::new(cfg, transport.clone(), Arc::new(TokioScheduler));
    cancel_on_ctrl_c(&pipeline);

    let started = now_rfc3339();
    let output = pipeline
        .run_upload(&upload)
        .await
        .with_context(|| format!("scanning {}", input.display()))?;

    let out_root = resolve_out_dir(cfg, out_override);
    let job_dir = out_root.join(output.job.id());

    let report_path = match &output.resolution {
        Some(Resolution::Delivered(report)) if cfg.output.write_report_json => {
            ensure_dir(&job_dir)?;
            let path = job_dir.join(&cfg.output.report_filename);
            std::fs::write(&path, serde_json::to_string_pretty(report)?)
                .with_context(|| format!("writing {}", path.display()))?;
            Some(path)
        }
        _ => None,
    };

    let saved = match export {
        Some(format) => {
            let requester = ExportRequester::new(transport);
            let saver = DirSaver::new(&job_dir);
            match requester
                .fetch_and_save(output.document_id(), format, &saver)
                .await
            {
                Ok(saved) => Some(saved),
                Err(err) => {
                    warn!("export skipped: {err}");
                    None
                }
            }
        }
        None => None,
    };

    if cfg.output.print_summary {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary(&output, &started, report_path, saved))?
        );
    }

    match output.failure() {
        Some(reason) => Err(anyhow!(reason)),
        None => Ok(()),
    }
}

fn summary(
    output: &JobOutput,
    started: &str,
    report_path: Option<PathBuf>,
    saved: Option<crate::export::SavedArtifact>,
) -> serde_json::Value {
    serde_json::json!({
        "job_id": output.job.id(),
        "status": output.job.status(),
        "document_id": output.document_id(),
        "poll": output.poll,
        "resolution": output.resolution,
        "report_error": output.report_error.as_ref().map(|e| e.to_string()),
        "report_path": report_path,
        "export": saved,
        "started": started,
        "finished": now_rfc3339(),
        "elapsed_ms": output.elapsed_ms,
    })
}

async fn status(cfg: &Config, transport: Arc<dyn Transport>, job_id: &str) -> Result<()> {
    let pipeline = Pipeline::new(cfg, transport, Arc::new(TokioScheduler));
    cancel_on_ctrl_c(&pipeline);

    let started = now_rfc3339();
    let mut session = pipeline.attach(job_id);
    let output = pipeline
        .drive(&mut session, std::time::Instant::now())
        .await
        .with_context(|| format!("following job {job_id}"))?;

    println!(
        "{}",
        serde_json::to_string_pretty(&summary(&output, &started, None, None))?
    );
    match output.failure() {
        Some(reason) => Err(anyhow!(reason)),
        None => Ok(()),
    }
}

async fn report(transport: Arc<dyn Transport>, document_id: &str) -> Result<()> {
    let out = transport
        .report(document_id)
        .await
        .with_context(|| format!("fetching report for {document_id}"))?;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "document_id": document_id,
            "detections": out.detections,
        }))?
    );
    Ok(())
}

async fn export_document(
    transport: Arc<dyn Transport>,
    document_id: &str,
    format: ExportFormat,
    out_dir: &Path,
) -> Result<()> {
    let requester = ExportRequester::new(transport);
    let saver = DirSaver::new(out_dir);
    let saved = requester
        .fetch_and_save(Some(document_id), format, &saver)
        .await?;
    println!("{}", serde_json::to_string_pretty(&saved)?);
    Ok(())
}
