//! CommandSender — POSTs user commands and classifies the reply.
//!
//! A body of exactly `"ok"` is success.  Any other body is a soft error: the
//! request worked but the server refused the command, and the body is shown
//! to the user.  Both cases ask the controller for an immediate status poll
//! so the panel reflects the command's effect.  Transport failures are
//! reported to the user and never retried.

use std::sync::Arc;

use remote_proto::protocol::{CommandReply, Payload};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::controller::ControlEvent;
use crate::error::{ApplicationError, CommandError};
use crate::load::LoadIndicator;
use crate::transport::{cancellable, Transport};

pub struct CommandSender<T> {
    transport: Arc<T>,
    events: mpsc::Sender<ControlEvent>,
    load: LoadIndicator,
}

impl<T> Clone for CommandSender<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            events: self.events.clone(),
            load: self.load.clone(),
        }
    }
}

impl<T: Transport> CommandSender<T> {
    pub fn new(transport: Arc<T>, events: mpsc::Sender<ControlEvent>, load: LoadIndicator) -> Self {
        Self {
            transport,
            events,
            load,
        }
    }

    /// POST `payload` to `path` and wait for the outcome.
    pub async fn send(
        &self,
        path: &str,
        payload: &Payload,
        cancel: &CancellationToken,
    ) -> Result<(), CommandError> {
        let result = {
            let _busy = self.load.begin();
            cancellable(cancel, self.transport.post(path, payload)).await
        };

        match result {
            Ok(body) => {
                debug!("server replied to {}: {}", path, body);
                let reply = CommandReply::from_body(&body);
                if let CommandReply::Rejected(message) = &reply {
                    warn!("command {} rejected: {}", path, message);
                    self.notify(ControlEvent::Alert(message.clone())).await;
                }
                self.notify(ControlEvent::Poll { requeue: false }).await;
                match reply {
                    CommandReply::Ok => Ok(()),
                    CommandReply::Rejected(message) => {
                        Err(ApplicationError::Rejected(message).into())
                    }
                }
            }
            Err(e) if e.is_cancelled() => Err(e.into()),
            Err(e) => {
                warn!("error posting command {}: {}", path, e);
                self.notify(ControlEvent::Alert(format!(
                    "Error sending command to server: {}",
                    e
                )))
                .await;
                Err(e.into())
            }
        }
    }

    async fn notify(&self, event: ControlEvent) {
        if self.events.send(event).await.is_err() {
            debug!("controller gone, dropping command notification");
        }
    }
}
