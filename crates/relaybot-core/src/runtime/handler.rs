//! Inbound message loop
//!
//! Pulls messages from a stream and dispatches each one on its own task so a
//! slow image run in one channel never holds up another.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, error, info};

use crate::channel::InboundMessage;

use super::dispatcher::ChatDispatcher;

/// Start the message loop.
///
/// The returned handle completes once `stream` has ended and every message
/// it produced has been handled.
pub fn spawn_message_loop<S>(stream: S, dispatcher: Arc<ChatDispatcher>) -> JoinHandle<()>
where
    S: Stream<Item = InboundMessage> + Send + Unpin + 'static,
{
    tokio::spawn(run_message_loop(stream, dispatcher))
}

/// Run the message loop on the current task, waiting for every spawned
/// message task before returning.
pub async fn run_message_loop<S>(mut stream: S, dispatcher: Arc<ChatDispatcher>)
where
    S: Stream<Item = InboundMessage> + Send + Unpin + 'static,
{
    info!("Starting chat message loop");
    let mut tasks = Vec::new();

    while let Some(message) = stream.next().await {
        debug!(
            "Handler received message {} from {}",
            message.id, message.conversation_id
        );

        let dispatcher = dispatcher.clone();
        tasks.push(tokio::spawn(async move {
            match dispatcher.dispatch(&message).await {
                Ok(outcome) => {
                    debug!("Message {} handled: {:?}", message.id, outcome);
                }
                Err(e) => {
                    error!(
                        "Error handling message {} from {}: {}",
                        message.id, message.conversation_id, e
                    );
                }
            }
        }));
        tasks.retain(|task| !task.is_finished());
    }

    for task in tasks {
        if let Err(e) = task.await {
            error!("Message task panicked: {}", e);
        }
    }
    info!("Message stream ended");
}
