use std::io::{stdout, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use anyhow::Context;
use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::style::Stylize;
use crossterm::terminal::{Clear, ClearType};
use tracing_subscriber::EnvFilter;
use vaultdrop::utils::{format_bytes, format_duration};
use vaultdrop::{
    load_config, login, FileDescriptor, NotificationKind, SessionConfig, UploadSession, UploadStatus,
};

const CONFIG_FILE: &str = "vaultdrop.toml";

fn guess_mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("pdf") => "application/pdf",
        Some("gif") => "image/gif",
        Some("txt") => "text/plain",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}

async fn describe(path: &Path) -> anyhow::Result<FileDescriptor> {
    let metadata = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(FileDescriptor::new(name, metadata.len(), guess_mime_type(path)))
}

fn render(session: &UploadSession, started: Instant) -> anyhow::Result<()> {
    let mut out = stdout();
    execute!(out, Clear(ClearType::All), MoveTo(0, 0))?;

    let user = session.user();
    writeln!(out, "[{}] {}  ·  {}", user.initial(), user.username(), format_duration(started.elapsed()))?;
    writeln!(out)?;

    for task in session.list() {
        let status = match task.status {
            UploadStatus::Uploading => "uploading".yellow(),
            UploadStatus::Completed => "completed".green(),
            UploadStatus::Error => "failed".red(),
        };
        let filled = usize::from(task.progress) / 5;
        let bar = format!("{}{}", "#".repeat(filled), ".".repeat(20 - filled));
        write!(out, "{:<32} {:>10} [{}] {:>3}% {}", task.name, format_bytes(task.size), bar, task.progress, status)?;
        if let Some(reason) = &task.failure_reason {
            write!(out, "  {}", reason.as_str().red())?;
        }
        writeln!(out)?;
    }

    writeln!(out)?;
    for notification in session.notifications().list() {
        let line = match notification.kind {
            NotificationKind::Success => notification.message.green(),
            NotificationKind::Error => notification.message.red(),
            NotificationKind::Info => notification.message.blue(),
        };
        writeln!(out, "  {}", line)?;
    }

    out.flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let username = args
        .next()
        .context("usage: vaultdrop <username> <file>...")?;
    let paths: Vec<PathBuf> = args.map(PathBuf::from).collect();
    if paths.is_empty() {
        anyhow::bail!("usage: vaultdrop <username> <file>...");
    }

    let config = if Path::new(CONFIG_FILE).exists() {
        load_config(CONFIG_FILE)?
    } else {
        SessionConfig::default()
    };

    let password = std::env::var("VAULTDROP_PASSWORD").unwrap_or_default();
    let user = login(&username, &password)?;
    let session = UploadSession::new(&user, config)?;

    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        files.push(describe(path).await?);
    }

    let started = Instant::now();
    session.submit(files);

    let mut ticker = tokio::time::interval(session.config().tick_interval);
    loop {
        ticker.tick().await;
        render(&session, started)?;

        if session.list().iter().all(|task| task.status.is_terminal()) {
            break;
        }
    }

    let snapshot = serde_json::to_string_pretty(&session.list())?;
    println!("{}", snapshot);

    Ok(())
}
