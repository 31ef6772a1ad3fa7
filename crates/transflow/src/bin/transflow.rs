use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::Notify;

use transflow::logging::{init_logging, LogFormat};
use transflow::{
    load_config, CompletionPoller, Config, ConfigError, IntakeSession, JobId, NotificationStore,
    PollScheduler, SqliteJobBackend, TransflowError, UploadedFile,
};

#[derive(Parser)]
#[command(
    name = "transflow",
    version,
    about = "Submit documents for translation and follow their jobs"
)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a document, price it and submit it
    Submit {
        config: PathBuf,
        file: PathBuf,
        #[arg(required = true)]
        languages: Vec<String>,
    },
    /// Mark a job in the local job store as complete
    Complete {
        config: PathBuf,
        job_id: String,
        #[arg(long)]
        project: Option<String>,
    },
    /// Mark a job in the local job store as failed
    Fail {
        config: PathBuf,
        job_id: String,
        #[arg(long, default_value = "Marked failed by operator")]
        reason: String,
    },
    /// Poll until every given job has completed or failed
    Watch {
        config: PathBuf,
        #[arg(required = true)]
        job_ids: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    init_logging("info", format);

    let result = match cli.command {
        Command::Submit {
            config,
            file,
            languages,
        } => submit(&config, &file, languages).await,
        Command::Complete {
            config,
            job_id,
            project,
        } => complete(&config, &job_id, project.as_deref()),
        Command::Fail {
            config,
            job_id,
            reason,
        } => fail(&config, &job_id, &reason),
        Command::Watch { config, job_ids } => watch(&config, job_ids).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn submit(
    config_path: &Path,
    file: &Path,
    languages: Vec<String>,
) -> Result<(), TransflowError> {
    let config = load_config(config_path)?;
    let session = IntakeSession::from_config(&config)?;

    let upload = UploadedFile::from_path(file).map_err(|e| ConfigError::ReadFile {
        path: file.to_path_buf(),
        source: e,
    })?;

    let handle = session.start_workflow(upload).await?;
    session.select_languages(handle, &languages).await?;
    let summary = session.complete_selection(handle).await?;
    let job_id = session.submit_request(handle).await?;

    let request = session.request(handle).await?;
    if let Some(analysis) = request.analysis() {
        println!(
            "{} ({}): {} words, {} characters",
            analysis.file_name, analysis.file_format, analysis.word_count, analysis.char_count
        );
    }
    println!(
        "Languages: {}",
        request
            .target_languages()
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!(
        "Credits: {}  Cost: {}",
        summary.credits_required,
        summary.total_cost.display_cents()
    );
    println!("Job: {}", job_id);

    session.end().await;
    Ok(())
}

fn local_backend(config: &Config) -> Result<SqliteJobBackend, TransflowError> {
    let path = config
        .resolved_database_path()
        .ok_or_else(|| ConfigError::Validation {
            message: "No home directory found; set database_path".to_string(),
        })?;
    Ok(SqliteJobBackend::open(&path)?)
}

fn complete(config_path: &Path, job_id: &str, project: Option<&str>) -> Result<(), TransflowError> {
    let config = load_config(config_path)?;
    let backend = local_backend(&config)?;
    let id = JobId::new(job_id);

    if backend.mark_complete(&id, project)? {
        println!("Job {} marked complete", id);
    } else {
        println!("No job {} in the local job store", id);
    }
    Ok(())
}

fn fail(config_path: &Path, job_id: &str, reason: &str) -> Result<(), TransflowError> {
    let config = load_config(config_path)?;
    let backend = local_backend(&config)?;
    let id = JobId::new(job_id);

    if backend.mark_failed(&id, reason)? {
        println!("Job {} marked failed", id);
    } else {
        println!("No job {} in the local job store", id);
    }
    Ok(())
}

async fn watch(config_path: &Path, job_ids: Vec<String>) -> Result<(), TransflowError> {
    let config = load_config(config_path)?;
    let backend = Arc::new(local_backend(&config)?);
    let store = Arc::new(NotificationStore::new());
    let poller = Arc::new(CompletionPoller::new(backend, store.clone()));

    let mut waiting: BTreeSet<JobId> = job_ids.into_iter().map(JobId::new).collect();
    for id in &waiting {
        poller.track(id.clone(), id.as_str());
    }

    let interrupted = Arc::new(Notify::new());
    {
        let interrupted = interrupted.clone();
        if let Err(e) = ctrlc::set_handler(move || interrupted.notify_one()) {
            log::warn!("Could not install Ctrl-C handler: {}", e);
        }
    }

    let mut subscription = store.subscribe();
    poller.tick().await;
    let scheduler = PollScheduler::start(poller.clone(), config.poll_interval());

    let mut printed = 0;
    loop {
        let feed = subscription.current();
        for notification in feed.iter().rev().skip(printed) {
            println!("[{}] {}: {}", notification.kind, notification.title, notification.message);
            if let Some(job_id) = &notification.job_id {
                waiting.remove(job_id);
            }
        }
        printed = feed.len();

        if waiting.is_empty() {
            break;
        }

        tokio::select! {
            changed = subscription.changed() => {
                if changed.is_none() {
                    break;
                }
            }
            _ = interrupted.notified() => {
                println!("Interrupted; {} job(s) still pending", waiting.len());
                break;
            }
        }
    }

    scheduler.shutdown().await;
    Ok(())
}
