//! The _channel open requests_ and responses.

use assh::{side::Side, Pipe};
use futures::SinkExt;
use ssh_packet::{arch::Utf8, connect, IntoPacket};

use super::Connect;
use crate::{channel, Result};

#[doc(no_inline)]
pub use ssh_packet::connect::{ChannelOpenContext, ChannelOpenFailureReason};

/// A received _channel open request_.
pub struct ChannelOpen<'r, IO: Pipe, S: Side> {
    connect: &'r Connect<IO, S>,
    inner: Option<connect::ChannelOpen<'static>>,
}

impl<'r, IO: Pipe, S: Side> ChannelOpen<'r, IO, S> {
    pub(super) fn new(connect: &'r Connect<IO, S>, inner: connect::ChannelOpen<'static>) -> Self {
        Self {
            connect,
            inner: Some(inner),
        }
    }

    /// Access the _context_ of the channel open request.
    pub fn cx(&self) -> &connect::ChannelOpenContext<'_> {
        &self
            .inner
            .as_ref()
            .expect("Inner value has been dropped before the outer structure")
            .context
    }

    /// Accept the channel open request, yielding the opened [`channel::Channel`].
    pub async fn accept(mut self) -> Result<channel::Channel<'r, IO, S>> {
        let inner = self
            .inner
            .take()
            .expect("Inner value has been dropped before the outer structure");

        let local_id = self
            .connect
            .channels
            .iter()
            .map(|id| *id)
            .max()
            .map(|id| id + 1)
            .unwrap_or_default();
        self.connect.channels.insert(local_id);

        self.connect
            .poller
            .lock()
            .await
            .send(
                connect::ChannelOpenConfirmation {
                    recipient_channel: inner.sender_channel,
                    sender_channel: local_id,
                    initial_window_size: channel::LocalWindow::INITIAL_WINDOW_SIZE,
                    maximum_packet_size: channel::LocalWindow::MAXIMUM_PACKET_SIZE,
                }
                .into_packet(),
            )
            .await?;

        Ok(channel::Channel::new(
            self.connect,
            local_id,
            inner.sender_channel,
            inner.initial_window_size,
            inner.maximum_packet_size,
        ))
    }

    fn rejected(
        reason: connect::ChannelOpenFailureReason,
        description: Utf8<'static>,
        recipient_channel: u32,
    ) -> connect::ChannelOpenFailure<'static> {
        connect::ChannelOpenFailure {
            recipient_channel,
            reason,
            description,
            language: Default::default(),
        }
    }

    /// Reject the channel open request.
    pub async fn reject(
        mut self,
        reason: connect::ChannelOpenFailureReason,
        description: impl Into<Utf8<'static>>,
    ) -> Result<()> {
        let inner = self
            .inner
            .take()
            .expect("Inner value has been dropped before the outer structure");

        self.connect
            .poller
            .lock()
            .await
            .send(
                Self::rejected(reason, description.into(), inner.sender_channel).into_packet(),
            )
            .await?;

        Ok(())
    }
}

impl<'r, IO: Pipe, S: Side> Drop for ChannelOpen<'r, IO, S> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            tracing::debug!(
                "Channel open request from `{}` was dropped without being handled, rejecting",
                inner.sender_channel
            );

            let packet = Self::rejected(
                connect::ChannelOpenFailureReason::AdministrativelyProhibited,
                "The channel opening was not handled".into(),
                inner.sender_channel,
            )
            .into_packet();

            if let Some(mut poller) = self.connect.poller.try_lock() {
                let _ = poller.start_send_unpin(packet);
            }
        }
    }
}
