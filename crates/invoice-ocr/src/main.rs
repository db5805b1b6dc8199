use std::collections::HashSet;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use log::{error, info, warn};
use tokio::sync::broadcast::error::RecvError;

use invoice_ocr::config::load_settings;
use invoice_ocr::storage::MemoryInvoiceSink;
use invoice_ocr::telemetry::{self, LogFormat, ENV_LOG_FORMAT};
use invoice_ocr::{FileSubmission, JobRecord, JobState, OcrEngine};

const USAGE: &str = "usage: invoice-ocr <file>...";

#[tokio::main]
async fn main() -> ExitCode {
    let format = match std::env::var(ENV_LOG_FORMAT) {
        Ok(value) => match value.parse::<LogFormat>() {
            Ok(format) => format,
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::from(2);
            }
        },
        Err(_) => LogFormat::default(),
    };
    if let Err(e) = telemetry::init_tracing(format) {
        eprintln!("{}", e);
    }

    let paths: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    if paths.is_empty() {
        eprintln!("{}", USAGE);
        return ExitCode::from(2);
    }

    match run(paths).await {
        Ok(records) => {
            match serde_json::to_string_pretty(&records) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    error!("Failed to serialize job records: {}", e);
                    return ExitCode::FAILURE;
                }
            }
            if records.iter().all(|r| r.status == JobState::Completed) {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Submits every path and waits until each job is terminal or Ctrl-C is pressed.
async fn run(paths: Vec<PathBuf>) -> invoice_ocr::Result<Vec<JobRecord>> {
    let settings = load_settings()?;
    let engine = OcrEngine::builder(settings)
        .sink(Arc::new(MemoryInvoiceSink::new()))
        .build()?;

    // Subscribe before submitting so no terminal event is missed
    let mut events = engine.subscribe();

    let mut job_ids = Vec::with_capacity(paths.len());
    for path in paths {
        let job_id = engine.submit_file(FileSubmission::new(path)).await?;
        job_ids.push(job_id);
    }
    info!("Submitted {} job(s)", job_ids.len());

    let mut pending: HashSet<String> = job_ids.iter().cloned().collect();
    let mut interrupted = false;
    while !pending.is_empty() {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) if event.is_terminal() => {
                    if pending.remove(&event.job_id) {
                        info!("Job {} finished: {}", event.job_id, event.status);
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Missed {} progress event(s), re-reading statuses", skipped);
                    pending.retain(|id| !engine.status(id).status.is_terminal());
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, reporting current statuses");
                interrupted = true;
                break;
            }
        }
    }

    let records = job_ids.iter().map(|id| engine.status(id)).collect();
    if !interrupted {
        engine.shutdown().await;
    }
    Ok(records)
}
