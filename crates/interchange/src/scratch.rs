//! Temporary value storage.
//!
//! An append-only store of values under opaque ids, written with the native
//! codec to files in a private temporary directory. Reads and writes of the
//! same id are serialized; closing the store deletes the directory.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tracing::debug;

use crate::codec::Codec;
use crate::error::CodecError;
use crate::native::NativeCodec;
use crate::value::Value;

#[derive(Debug, Clone, Default)]
pub struct ScratchOptions {
    /// Parent of the store directory; the OS temp dir when unset.
    pub dir: Option<PathBuf>,
}

struct Inner {
    path: PathBuf,
    dir: Mutex<Option<TempDir>>,
    next_id: AtomicU64,
    locks: DashMap<u64, Arc<Mutex<()>>>,
    closed: AtomicBool,
}

impl Inner {
    fn file(&self, id: u64) -> PathBuf {
        self.path.join(format!("{id}.bin"))
    }

    /// Runs `op` holding the lock for `id`. The lock is dropped from the
    /// table once no other operation holds or waits on it.
    async fn locked<T, F>(&self, id: u64, op: F) -> Result<T, CodecError>
    where
        F: Future<Output = Result<T, CodecError>>,
    {
        let lock = self.locks.entry(id).or_default().clone();
        let result = {
            let _guard = lock.lock().await;
            op.await
        };
        drop(lock);
        self.locks.remove_if(&id, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    fn check_open(&self) -> Result<(), CodecError> {
        if self.closed.load(Ordering::Acquire) {
            Err(CodecError::StoreClosed)
        } else {
            Ok(())
        }
    }

    async fn read(&self, id: u64) -> Result<Value, CodecError> {
        self.check_open()?;
        let bytes = self
            .locked(id, async { tokio::fs::read(self.file(id)).await.map_err(CodecError::from) })
            .await?;
        debug!(id, bytes = bytes.len(), "scratch read");
        NativeCodec.decode(&bytes)
    }
}

#[derive(Clone)]
pub struct ScratchStore {
    inner: Arc<Inner>,
}

impl ScratchStore {
    pub fn new(options: ScratchOptions) -> Result<Self, CodecError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("interchange-scratch-");
        let dir = match &options.dir {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };
        debug!(path = %dir.path().display(), "scratch store opened");
        Ok(Self {
            inner: Arc::new(Inner {
                path: dir.path().to_path_buf(),
                dir: Mutex::new(Some(dir)),
                next_id: AtomicU64::new(0),
                locks: DashMap::new(),
                closed: AtomicBool::new(false),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Stores `value` under a fresh id.
    pub async fn write(&self, value: &Value) -> Result<ScratchEntry, CodecError> {
        self.inner.check_open()?;
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let bytes = NativeCodec.encode(value)?;
        self.inner
            .locked(id, async {
                tokio::fs::write(self.inner.file(id), &bytes)
                    .await
                    .map_err(CodecError::from)
            })
            .await?;
        debug!(id, bytes = bytes.len(), "scratch write");
        Ok(ScratchEntry {
            id,
            store: Arc::clone(&self.inner),
        })
    }

    pub async fn read(&self, id: u64) -> Result<Value, CodecError> {
        self.inner.read(id).await
    }

    /// Deletes every stored value. Later reads and writes fail with
    /// [`CodecError::StoreClosed`].
    pub async fn close(&self) -> Result<(), CodecError> {
        self.inner.closed.store(true, Ordering::Release);
        let dir = self.inner.dir.lock().await.take();
        if let Some(dir) = dir {
            debug!(path = %self.inner.path.display(), "scratch store closed");
            dir.close()?;
        }
        self.inner.locks.clear();
        Ok(())
    }
}

/// Handle to one stored value.
#[derive(Clone)]
pub struct ScratchEntry {
    pub id: u64,
    store: Arc<Inner>,
}

impl ScratchEntry {
    pub async fn read(&self) -> Result<Value, CodecError> {
        self.store.read(self.id).await
    }
}
