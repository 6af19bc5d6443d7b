use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use chrono::Utc;
use tokio::sync::broadcast::error::RecvError;

use fanvault_library::ContentDraft;
use fanvault_protocol::{MediaFile, UploadId};
use fanvault_uploader::{HttpTransport, UploadEvent, UploaderConfig, UploaderHandle};

use crate::{Commands, DraftCommands};

pub async fn run(command: Commands, config_path: &Path) -> anyhow::Result<()> {
    let config = UploaderConfig::load(config_path)
        .with_context(|| format!("cannot load {}", config_path.display()))?;
    tracing::debug!(path = %config_path.display(), "configuration loaded");

    let transport = Arc::new(HttpTransport::new(
        &config.endpoint,
        config.auth_token.as_deref(),
    )?);
    let handle = UploaderHandle::open(config, transport)?;

    let result = dispatch(&handle, command, config_path).await;
    handle.shutdown().await?;
    result
}

async fn dispatch(
    handle: &UploaderHandle,
    command: Commands,
    config_path: &Path,
) -> anyhow::Result<()> {
    match command {
        Commands::Upload {
            file,
            content,
            priority,
            resume,
        } => {
            let media = MediaFile::from_path(&file)
                .with_context(|| format!("cannot read {}", file.display()))?;
            let metadata = content.into_metadata();

            let mut events = handle.subscribe();
            let queued = match resume {
                Some(upload_id) => {
                    handle
                        .resume_upload(upload_id, media, metadata, priority)
                        .await?
                }
                None => handle.add_upload(media, metadata, priority).await?,
            };
            println!("queued {} as {}", queued.media.name, queued.upload_id);
            follow(&mut events, queued.upload_id).await
        }
        Commands::Sessions => {
            let sessions = handle.recoverable_sessions()?;
            if sessions.is_empty() {
                println!("no interrupted uploads");
            }
            for s in sessions {
                println!(
                    "{}  {}/{} chunks  expires {}",
                    s.upload_id,
                    s.uploaded_chunks.len(),
                    s.total_chunks,
                    s.expires_at.format("%Y-%m-%d %H:%M")
                );
            }
            Ok(())
        }
        Commands::Draft { sub } => draft(handle, sub).await,
        Commands::History { limit } => {
            for entry in handle.history().iter().rev().take(limit) {
                let detail = entry
                    .content_id
                    .as_deref()
                    .or(entry.error.as_deref())
                    .unwrap_or("");
                println!(
                    "{}  {:<9}  {}  \"{}\"  {}",
                    entry.uploaded_at.format("%Y-%m-%d %H:%M"),
                    format!("{:?}", entry.status).to_lowercase(),
                    entry.file_name,
                    entry.metadata.title,
                    detail
                );
            }
            Ok(())
        }
        Commands::Stats => {
            let stats = handle.statistics();
            println!("uploads:        {}", stats.total_uploads);
            println!("  successful:   {}", stats.successful_uploads);
            println!("  failed:       {}", stats.failed_uploads);
            println!("success rate:   {:.1}%", stats.success_rate() * 100.0);
            println!("average time:   {} ms", stats.average_upload_time_ms());
            println!(
                "storage:        {} / {} bytes",
                stats.storage_used(),
                stats.storage_quota
            );
            if let Some(category) = stats.most_used_category() {
                println!("top category:   {category}");
            }
            Ok(())
        }
        Commands::Config => print_config(handle.config(), config_path),
    }
}

async fn draft(handle: &UploaderHandle, command: DraftCommands) -> anyhow::Result<()> {
    match command {
        DraftCommands::Save { file, content } => {
            let media = MediaFile::from_path(&file)
                .with_context(|| format!("cannot read {}", file.display()))?;
            let draft = handle.library().save_draft(ContentDraft::new(
                media,
                content.into_metadata(),
                Utc::now(),
            ))?;
            println!("saved draft {}", draft.id);
        }
        DraftCommands::List => {
            for d in handle.library().drafts() {
                println!(
                    "{}  {}  \"{}\"  updated {}",
                    d.id,
                    d.media.name,
                    d.metadata.title,
                    d.updated_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        DraftCommands::Submit { id, priority } => {
            let mut events = handle.subscribe();
            let queued = handle.submit_draft(id, priority).await?;
            println!("queued {} as {}", queued.media.name, queued.upload_id);
            follow(&mut events, queued.upload_id).await?;
        }
        DraftCommands::Delete { id } => {
            if !handle.library().delete_draft(id)? {
                bail!("no draft {id}");
            }
            println!("deleted draft {id}");
        }
    }
    Ok(())
}

/// Prints the events of one upload until it finishes or Ctrl-C is pressed.
async fn follow(
    events: &mut tokio::sync::broadcast::Receiver<UploadEvent>,
    upload_id: UploadId,
) -> anyhow::Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) if event.upload_id() == upload_id => {
                    if let Some(outcome) = report(&event) {
                        return outcome;
                    }
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => bail!("uploader stopped unexpectedly"),
            },
            _ = &mut ctrl_c => {
                println!();
                println!("interrupted; run the same upload with --resume {upload_id} to continue");
                return Ok(());
            }
        }
    }
}

/// Prints one event. Returns the outcome once the upload is final.
fn report(event: &UploadEvent) -> Option<anyhow::Result<()>> {
    match event {
        UploadEvent::Queued(_) => None,
        UploadEvent::StatusChanged { from, item } => {
            println!();
            println!("{from} -> {}", item.status);
            None
        }
        UploadEvent::Progress(item) => {
            let rate = item
                .bytes_per_second
                .map(|bps| format!("  {:.1} KiB/s", bps / 1024.0))
                .unwrap_or_default();
            print!(
                "\r{:>5.1}%  {}/{} bytes{rate}",
                item.progress, item.uploaded_bytes, item.total_bytes
            );
            let _ = std::io::stdout().flush();
            None
        }
        UploadEvent::Retrying { item, delay } => {
            println!();
            println!(
                "attempt {}/{} failed: {}; retrying in {:?}",
                item.retry_count,
                item.max_retries,
                item.error.as_deref().unwrap_or("unknown error"),
                delay
            );
            None
        }
        UploadEvent::Completed { content_id, .. } => {
            println!();
            match content_id {
                Some(id) => println!("done: content {id}"),
                None => println!("done"),
            }
            Some(Ok(()))
        }
        UploadEvent::Failed(item) => {
            println!();
            Some(Err(anyhow!(
                "upload failed: {}",
                item.error.as_deref().unwrap_or("unknown error")
            )))
        }
        UploadEvent::Cancelled(_) | UploadEvent::Dismissed(_) => {
            Some(Err(anyhow!("upload cancelled")))
        }
    }
}

fn print_config(config: &UploaderConfig, path: &Path) -> anyhow::Result<()> {
    let mut config = config.clone();
    if config.auth_token.is_some() {
        config.auth_token = Some("********".into());
    }
    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
