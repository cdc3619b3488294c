use std::{io, num::NonZeroU32, pin::Pin, task};

use futures::{FutureExt, SinkExt};
use ssh_packet::{connect, IntoPacket, Packet};

use assh::{side::Side, Pipe};

use crate::channel::Channel;

pub struct Write<'a, IO: Pipe, S: Side> {
    channel: &'a Channel<'a, IO, S>,
    stream_id: Option<NonZeroU32>,

    buffer: Vec<u8>,
}

impl<'a, IO: Pipe, S: Side> Write<'a, IO, S> {
    pub fn new(channel: &'a Channel<'a, IO, S>, stream_id: Option<NonZeroU32>) -> Self {
        Self {
            channel,
            stream_id,

            buffer: Default::default(),
        }
    }
}

impl<IO: Pipe, S: Side> futures::AsyncWrite for Write<'_, IO, S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
        buf: &[u8],
    ) -> task::Poll<io::Result<usize>> {
        loop {
            let max_size = self.channel.remote_maxpack as usize;
            let writable = buf.len().min(max_size.saturating_sub(self.buffer.len()));
            if writable == 0 {
                futures::ready!(self.as_mut().poll_flush(cx))?;

                continue;
            }

            let reserved = futures::ready!(self
                .channel
                .remote_window
                .poll_reserve(cx, writable as u32)) as usize;
            self.buffer.extend_from_slice(&buf[..reserved]);

            break task::Poll::Ready(Ok(reserved));
        }
    }

    fn poll_flush(
        mut self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> task::Poll<io::Result<()>> {
        if self.buffer.is_empty() {
            return task::Poll::Ready(Ok(()));
        }

        let mut poller = futures::ready!(self.channel.connect.poller.lock().poll_unpin(cx));

        futures::ready!(poller.poll_ready_unpin(cx))
            .map_err(|err| io::Error::new(io::ErrorKind::BrokenPipe, err))?;

        let packet = if let Some(data_type) = self.stream_id {
            connect::ChannelExtendedData {
                recipient_channel: self.channel.remote_id,
                data_type,
                data: self.buffer.drain(..).collect::<Vec<_>>().into(),
            }
            .into_packet()
        } else {
            connect::ChannelData {
                recipient_channel: self.channel.remote_id,
                data: self.buffer.drain(..).collect::<Vec<_>>().into(),
            }
            .into_packet()
        }
        .expect("Conversion to Packet shouldn't fail");

        poller
            .start_send_unpin(packet)
            .map_err(|err| io::Error::new(io::ErrorKind::BrokenPipe, err))?;

        task::Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> task::Poll<io::Result<()>> {
        self.poll_flush(cx)
    }
}
