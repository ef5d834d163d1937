//! UpdateQueue — debounced sender for one editable field.
//!
//! Each `enqueue` replaces the pending payload and restarts the quiet-period
//! timer; only the last payload of a burst reaches the server.  Once the
//! timer has fired the send is committed: a later edit does not abort it but
//! starts its own debounce cycle, and its POST waits until the earlier one
//! has completed.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use remote_proto::protocol::Payload;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::command::CommandSender;
use crate::controller::ControlEvent;
use crate::transport::Transport;

type FinishedCallback = Arc<dyn Fn(bool) + Send + Sync>;

pub struct UpdateQueue<T> {
    path: String,
    delay: Duration,
    sender: CommandSender<T>,
    events: mpsc::Sender<ControlEvent>,
    /// Cancelled on shutdown; parent of every timer and send.
    lifetime: CancellationToken,
    /// Timer of the pending (not yet fired) edit.
    timer: Option<CancellationToken>,
    generation: Arc<AtomicU64>,
    queued: Arc<AtomicBool>,
    transmitting: Arc<AtomicBool>,
    send_lock: Arc<Mutex<()>>,
    on_finished: Option<FinishedCallback>,
}

impl<T: Transport> UpdateQueue<T> {
    pub fn new(
        path: impl Into<String>,
        delay: Duration,
        sender: CommandSender<T>,
        events: mpsc::Sender<ControlEvent>,
        lifetime: CancellationToken,
    ) -> Self {
        Self {
            path: path.into(),
            delay,
            sender,
            events,
            lifetime,
            timer: None,
            generation: Arc::new(AtomicU64::new(0)),
            queued: Arc::new(AtomicBool::new(false)),
            transmitting: Arc::new(AtomicBool::new(false)),
            send_lock: Arc::new(Mutex::new(())),
            on_finished: None,
        }
    }

    /// Run `callback` after every completed send, successful or not.  The
    /// argument is true when no newer edit is waiting behind this one.
    pub fn on_finished(mut self, callback: impl Fn(bool) + Send + Sync + 'static) -> Self {
        self.on_finished = Some(Arc::new(callback));
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// True from the first `enqueue` until the send of the latest edit has
    /// completed.
    pub fn is_queued(&self) -> bool {
        self.queued.load(Ordering::SeqCst)
    }

    pub fn is_transmitting(&self) -> bool {
        self.transmitting.load(Ordering::SeqCst)
    }

    pub fn enqueue(&mut self, payload: Payload) {
        self.queued.store(true, Ordering::SeqCst);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(previous) = self.timer.take() {
            trace!("{}: superseding pending edit", self.path);
            previous.cancel();
        }
        let timer = self.lifetime.child_token();
        self.timer = Some(timer.clone());

        let path = self.path.clone();
        let delay = self.delay;
        let sender = self.sender.clone();
        let events = self.events.clone();
        let lifetime = self.lifetime.clone();
        let latest = Arc::clone(&self.generation);
        let queued = Arc::clone(&self.queued);
        let transmitting = Arc::clone(&self.transmitting);
        let send_lock = Arc::clone(&self.send_lock);
        let on_finished = self.on_finished.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = timer.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }

            let _serial = send_lock.lock().await;
            transmitting.store(true, Ordering::SeqCst);
            debug!("{}: sending edit #{}", path, generation);
            let result = sender.send(&path, &payload, &lifetime).await;
            transmitting.store(false, Ordering::SeqCst);

            if matches!(&result, Err(e) if e.is_cancelled()) {
                return;
            }
            let settled = latest.load(Ordering::SeqCst) == generation;
            if settled {
                queued.store(false, Ordering::SeqCst);
            } else {
                trace!("{}: edit #{} sent, newer edit still queued", path, generation);
            }
            let _ = events.send(ControlEvent::Poll { requeue: false }).await;
            if let Some(callback) = on_finished {
                callback(settled);
            }
        });
    }
}

impl<T> Drop for UpdateQueue<T> {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}
