//! Outbound event delivery
//!
//! This module defines the trait the match actor uses to hand events to
//! whatever sits between the engine and the participants. Implementations
//! for tokio channels are provided so that a transport layer only needs to
//! drain a receiver.

use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use crate::game::UpdateMessage;

/// Trait for sending messages through a communication tunnel
///
/// This trait abstracts the communication mechanism used to send messages
/// to connected clients. Implementations might use WebSockets, Server-Sent
/// Events, or in-process channels.
pub trait Tunnel {
    /// Sends an update message to the client
    ///
    /// Delivery is best effort; a tunnel with nobody listening drops the message.
    ///
    /// # Arguments
    ///
    /// * `message` - The update message to send
    fn send_message(&self, message: &UpdateMessage);

    /// Closes the communication tunnel
    ///
    /// This method is called once the match is over and no further messages
    /// will be sent.
    fn close(self);
}

impl Tunnel for broadcast::Sender<UpdateMessage> {
    fn send_message(&self, message: &UpdateMessage) {
        if self.send(message.clone()).is_err() {
            debug!("no subscribers for update");
        }
    }

    fn close(self) {
        drop(self);
    }
}

impl Tunnel for mpsc::UnboundedSender<UpdateMessage> {
    fn send_message(&self, message: &UpdateMessage) {
        if self.send(message.clone()).is_err() {
            debug!("update receiver dropped");
        }
    }

    fn close(self) {
        drop(self);
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_tunnel_delivers_in_order() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        sender.send_message(&UpdateMessage::Tick { remaining: 2 });
        sender.send_message(&UpdateMessage::Tick { remaining: 1 });
        sender.close();

        assert!(matches!(
            receiver.try_recv(),
            Ok(UpdateMessage::Tick { remaining: 2 })
        ));
        assert!(matches!(
            receiver.try_recv(),
            Ok(UpdateMessage::Tick { remaining: 1 })
        ));
        assert!(matches!(
            receiver.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_broadcast_tunnel_without_subscribers() {
        let (sender, receiver) = broadcast::channel(4);
        drop(receiver);
        sender.send_message(&UpdateMessage::Tick { remaining: 1 });
        sender.close();
    }

    #[test]
    fn test_broadcast_tunnel_reaches_every_subscriber() {
        let (sender, mut first) = broadcast::channel(4);
        let mut second = sender.subscribe();
        sender.send_message(&UpdateMessage::Tick { remaining: 5 });

        assert!(matches!(first.try_recv(), Ok(UpdateMessage::Tick { remaining: 5 })));
        assert!(matches!(second.try_recv(), Ok(UpdateMessage::Tick { remaining: 5 })));
    }
}
