//! Page synchronizer.
//!
//! Keeps a mirror of the page as last saved and streams every saved batch to
//! one subscriber over a bounded channel. A subscriber attaches with
//! [`AsyncPage::start_sync`], which returns the full mirror and swaps in a
//! fresh channel, then drains [`AsyncPage::changes`]. Anything saved before the
//! swap is in the snapshot, anything after is in the new channel.

use std::ops::Deref;

use parking_lot::Mutex;
use serde_json::{Map, Value as Json, json};
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio_util::sync::CancellationToken;

use super::{Batch, Page, PageError};

struct Mirror {
    current: Map<String, Json>,
    tx: mpsc::Sender<Batch>,
}

/// A page with a snapshot mirror and a delta stream.
pub struct AsyncPage {
    page: Page,
    capacity: usize,
    /// Guards the mirror and the active sender. Never held across an await.
    mirror: Mutex<Mirror>,
    /// Serializes `save()`: drain, apply and enqueue happen in one order.
    save_lock: AsyncMutex<()>,
    rx: AsyncMutex<mpsc::Receiver<Batch>>,
    closed: CancellationToken,
}

impl AsyncPage {
    /// `capacity` bounds the delta channel; a full channel blocks `save()`.
    pub fn new(url: impl Into<String>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            page: Page::new(url),
            capacity: capacity.max(1),
            mirror: Mutex::new(Mirror {
                current: Map::new(),
                tx,
            }),
            save_lock: AsyncMutex::new(()),
            rx: AsyncMutex::new(rx),
            closed: CancellationToken::new(),
        }
    }

    /// Flush pending changes to the mirror and the subscriber.
    ///
    /// No-op when nothing is pending. Waits while the channel is full.
    pub async fn save(&self) -> Result<(), PageError> {
        let _order = self.save_lock.lock().await;

        let Some(batch) = self.page.diff() else {
            return Ok(());
        };
        crate::debug!("sync"; "{}: saving {} op(s)", self.url(), batch.len());

        let tx = {
            let mut mirror = self.mirror.lock();
            for op in batch.ops() {
                op.apply(&mut mirror.current);
            }
            mirror.tx.clone()
        };

        tokio::select! {
            biased;
            () = self.closed.cancelled() => Err(PageError::Closed(self.url().to_string())),
            sent = tx.send(batch) => {
                // A replaced channel has no reader left. The batch is already
                // part of the mirror, so the next snapshot carries it.
                if sent.is_err() {
                    crate::debug!("sync"; "{}: batch went to a detached stream", self.url());
                }
                Ok(())
            }
        }
    }

    /// Attach a subscriber: return the full mirror as `{"p":{"c":..}}` and
    /// start a fresh delta stream.
    ///
    /// A previous subscriber's `changes()` returns `None` once its stream is
    /// drained. A closed page has no stream to hand out.
    pub async fn start_sync(&self) -> Result<Json, PageError> {
        if self.is_closed() {
            return Err(PageError::Closed(self.url().to_string()));
        }
        let (tx, rx) = mpsc::channel(self.capacity);
        let snapshot = {
            let mut mirror = self.mirror.lock();
            mirror.tx = tx;
            json!({ "p": { "c": mirror.current.clone() } })
        };
        *self.rx.lock().await = rx;
        crate::debug!("sync"; "{}: subscriber attached", self.url());
        Ok(snapshot)
    }

    /// Wait for the next saved batch.
    ///
    /// `None` when the stream was superseded by a later `start_sync` or the
    /// page was closed.
    pub async fn changes(&self) -> Option<Batch> {
        let mut rx = self.rx.lock().await;
        tokio::select! {
            biased;
            () = self.closed.cancelled() => None,
            batch = rx.recv() => batch,
        }
    }

    /// Release anyone blocked in `save()` or `changes()`.
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Copy of the mirror.
    pub fn current(&self) -> Map<String, Json> {
        self.mirror.lock().current.clone()
    }
}

impl Deref for AsyncPage {
    type Target = Page;

    fn deref(&self) -> &Page {
        &self.page
    }
}

impl std::fmt::Debug for AsyncPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncPage")
            .field("url", &self.url())
            .field("capacity", &self.capacity)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
