//! Append-only file.
//!
//! Every successful write command is appended to the file in its wire encoding, so the file
//! is a headerless sequence of RESP arrays in execution order. A background task fsyncs the
//! file on a fixed interval, which bounds the writes lost on a crash to one interval.

use futures::StreamExt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, Notify};
use tokio::time::{self, Duration, MissedTickBehavior};
use tokio_util::codec::FramedRead;
use tracing::{debug, error, info};

use crate::codec::FrameCodec;
use crate::frame::Frame;
use crate::Result;

pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(1);

/// Handle to the append-only file. Clones share the same file and sync task.
#[derive(Clone)]
pub struct Aof {
    inner: Arc<Inner>,
}

struct Inner {
    path: PathBuf,
    // Appends and syncs take this lock, so a sync never sees half a record.
    file: Mutex<File>,
    shutdown: Arc<Notify>,
}

impl Aof {
    /// Opens the file at `path` for appending, creating it and its parent directories when
    /// missing, and starts the periodic sync task on the current runtime. `sync_interval`
    /// must be non-zero.
    pub async fn open(path: impl AsRef<Path>, sync_interval: Duration) -> Result<Aof> {
        if sync_interval.is_zero() {
            return Err("append-only file sync interval must be greater than zero".into());
        }

        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        let shutdown = Arc::new(Notify::new());
        let inner = Arc::new(Inner {
            path,
            file: Mutex::new(file),
            shutdown: shutdown.clone(),
        });

        tokio::spawn(sync_periodically(
            Arc::downgrade(&inner),
            shutdown,
            sync_interval,
        ));

        info!("Append-only file opened: {:?}", inner.path);

        Ok(Aof { inner })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Appends the encoded `frame` and hands it to the operating system. The record reaches
    /// stable storage on the next sync.
    pub async fn append(&self, frame: &Frame) -> Result<()> {
        let bytes = frame.serialize();

        let mut file = self.inner.file.lock().await;
        file.write_all(&bytes).await?;
        // Tokio completes file writes in the background; flushing waits for the write and
        // surfaces its error.
        file.flush().await?;

        debug!("Appended {} bytes to the append-only file", bytes.len());
        Ok(())
    }

    /// Forces every appended record to stable storage.
    pub async fn sync(&self) -> Result<()> {
        self.inner.sync().await
    }

    /// Decodes every record from the start of the file and hands it to `apply`, returning how
    /// many were replayed. A truncated or malformed record aborts the replay with an error.
    pub async fn replay<F>(&self, mut apply: F) -> Result<usize>
    where
        F: FnMut(Frame),
    {
        let file = match File::open(&self.inner.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut frames = FramedRead::new(file, FrameCodec::default());
        let mut count = 0;

        while let Some(frame) = frames.next().await {
            let frame = frame.map_err(|e| {
                format!("corrupt append-only file after {} records: {}", count, e)
            })?;
            apply(frame);
            count += 1;
        }

        Ok(count)
    }

    /// Stops the sync task and syncs one last time.
    pub async fn close(&self) -> Result<()> {
        self.inner.shutdown.notify_one();
        self.inner.sync().await?;

        info!("Append-only file closed: {:?}", self.inner.path);
        Ok(())
    }
}

impl Inner {
    async fn sync(&self) -> Result<()> {
        let mut file = self.file.lock().await;
        file.flush().await?;
        file.sync_data().await?;
        Ok(())
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown.notify_one();
    }
}

async fn sync_periodically(inner: Weak<Inner>, shutdown: Arc<Notify>, period: Duration) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.notified() => break,
        }

        // The last handle is gone.
        let Some(aof) = inner.upgrade() else {
            break;
        };

        if let Err(e) = aof.sync().await {
            error!("Failed to sync append-only file {:?}: {}", aof.path, e);
        }
    }

    debug!("Append-only file sync task stopped");
}
