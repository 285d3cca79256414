//! An in-memory stand-in for a TUN device, used on the server side where
//! one real TUN device is shared across many client sessions (spec.md
//! §4.8: "a server-level table maps each client's assigned tunnel IP to
//! its outbound send handle"). Reads pull whole packets off a per-peer
//! channel fed by the TUN router; writes push whole packets onto a
//! channel drained by the single TUN-writer task.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::mpsc;

pub struct ChannelIo {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    tx: mpsc::UnboundedSender<Vec<u8>>,
    pending: Option<(Vec<u8>, usize)>,
}

impl ChannelIo {
    pub fn new(rx: mpsc::UnboundedReceiver<Vec<u8>>, tx: mpsc::UnboundedSender<Vec<u8>>) -> Self {
        Self {
            rx,
            tx,
            pending: None,
        }
    }
}

impl AsyncRead for ChannelIo {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            if let Some((packet, cursor)) = this.pending.take() {
                let remaining = &packet[cursor..];
                let n = remaining.len().min(buf.remaining());
                buf.put_slice(&remaining[..n]);
                if cursor + n < packet.len() {
                    this.pending = Some((packet, cursor + n));
                }
                return Poll::Ready(Ok(()));
            }
            match this.rx.poll_recv(cx) {
                Poll::Ready(Some(packet)) => {
                    this.pending = Some((packet, 0));
                    continue;
                }
                Poll::Ready(None) => return Poll::Ready(Ok(())),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl AsyncWrite for ChannelIo {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.tx.send(buf.to_vec()) {
            Ok(()) => Poll::Ready(Ok(buf.len())),
            Err(_) => Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "channel peer gone"))),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
