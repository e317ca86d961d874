//! Live status monitor.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use ankerdash_core::{Dashboard, VideoSink};
use tracing::{debug, info, warn};

use crate::cli::MonitorArgs;
use crate::config::Context;
use crate::error::CliError;
use crate::output::{self, TerminalSink};

// ── Video capture ────────────────────────────────────────────────────

/// Appends every raw video frame to a file.
struct FileVideoSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
    frames: AtomicU64,
    bytes: AtomicU64,
}

impl FileVideoSink {
    fn create(path: &Path) -> Result<Self, CliError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_owned(),
            writer: Mutex::new(BufWriter::new(file)),
            frames: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
        })
    }
}

impl VideoSink for FileVideoSink {
    fn open(&self) {
        debug!(path = %self.path.display(), "video stream opened");
    }

    fn frame(&self, data: &[u8]) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writer.write_all(data) {
            warn!(path = %self.path.display(), error = %e, "failed to write video frame");
            return;
        }
        self.frames.fetch_add(1, Ordering::Relaxed);
        self.bytes
            .fetch_add(u64::try_from(data.len()).unwrap_or(u64::MAX), Ordering::Relaxed);
    }

    fn close(&self) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writer.flush() {
            warn!(path = %self.path.display(), error = %e, "failed to flush video file");
        }
        debug!(
            path = %self.path.display(),
            frames = self.frames.load(Ordering::Relaxed),
            bytes = self.bytes.load(Ordering::Relaxed),
            "video stream closed"
        );
    }
}

// ── Handler ──────────────────────────────────────────────────────────

pub async fn handle(args: MonitorArgs, ctx: &Context) -> Result<(), CliError> {
    let settings = ctx.settings;
    let color = output::should_color(settings.color);

    let video = args
        .video_out
        .as_deref()
        .map(FileVideoSink::create)
        .transpose()?
        .map(Arc::new);
    let video_sink = video
        .as_ref()
        .map(|v| -> Arc<dyn VideoSink> { Arc::<FileVideoSink>::clone(v) });

    let sink = Arc::new(TerminalSink::new(settings.output, color, settings.quiet));
    let dash = Dashboard::new(ctx.dashboard.clone(), sink, video_sink)?;
    let started = dash.start()?;
    info!(channels = ?started, "monitoring");

    let waited = wait(args.duration).await;
    dash.shutdown();

    if let Some(video) = &video {
        video.close();
    }
    waited?;

    let summary = output::render_view(settings.output, &dash.view(), color)?;
    output::print_output(&summary, settings.quiet);
    Ok(())
}

/// Block until Ctrl-C or, when given, until `duration` elapses.
async fn wait(duration: Option<std::time::Duration>) -> Result<(), CliError> {
    match duration {
        Some(duration) => {
            tokio::select! {
                interrupted = tokio::signal::ctrl_c() => interrupted?,
                () = tokio::time::sleep(duration) => {}
            }
        }
        None => tokio::signal::ctrl_c().await?,
    }
    Ok(())
}
