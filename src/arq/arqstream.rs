//! Asynchronous ARQ Connections
//!
//! This module exposes the `ArqStream` type which implements
//! `AsyncRead` and `AsyncWrite`. These traits enable access
//! to RF connections much as one would use a TCP socket.

use std::cmp::min;
use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::channel::mpsc;
use futures::io::{AsyncRead, AsyncWrite};
use futures::stream::Stream;
use futures::task::{Context, Poll};

use super::connectioninfo::ConnectionInfo;
use crate::framing::Outbound;
use crate::protocol::command;
use crate::tncio::session::{SessionHandle, SessionShared};

/// A TCP-like interface for ARQ RF connections
///
/// Reads return payload received from the peer, in order.
/// Once the session ends, reads drain whatever was already
/// received and then return EOF.
///
/// Writes are queued for the TNC. While the TNC reports more
/// unacknowledged bytes than the configured high-water mark,
/// writes wait. Writes after the session ends fail with
/// `io::ErrorKind::BrokenPipe`.
pub struct ArqStream {
    info: ConnectionInfo,
    inbound: mpsc::Receiver<Bytes>,
    current: Bytes,
    shared: Arc<SessionShared>,
    outbound: mpsc::UnboundedSender<Outbound>,
    send_high_water: u64,
    disconnect_sent: bool,
    open_time: Instant,
    bytecount_rx: u64,
    bytecount_tx: u64,
}

impl ArqStream {
    /// True if the connection is open
    ///
    /// Becomes false as soon as the TNC reports the session
    /// has ended. Data already received may still be read.
    pub fn is_open(&self) -> bool {
        !self.shared.is_closed()
    }

    /// True if the local side has asked to disconnect
    ///
    /// While the disconnect is "in flight," `is_open()`
    /// will continue to return true.
    pub fn is_disconnecting(&self) -> bool {
        self.disconnect_sent && self.is_open()
    }

    /// Return connection information
    ///
    /// Includes immutable details about the connection, such
    /// as the local and remote callsigns.
    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    /// Total number of payload bytes read from this stream
    pub fn bytes_received(&self) -> u64 {
        self.bytecount_rx
    }

    /// Total number of payload bytes accepted for transmission
    pub fn bytes_transmitted(&self) -> u64 {
        self.bytecount_tx
    }

    /// Bytes pending peer acknowledgement
    ///
    /// The most recent `BUFFER` report from the TNC, plus
    /// any bytes written since.
    pub fn bytes_unacknowledged(&self) -> u64 {
        self.shared.pending()
    }

    /// Time elapsed since the connection opened
    pub fn elapsed_time(&self) -> Duration {
        self.open_time.elapsed()
    }

    // Claim a session offered by the dispatcher
    pub(crate) fn new(handle: SessionHandle) -> Self {
        ArqStream {
            info: handle.info,
            inbound: handle.inbound,
            current: Bytes::new(),
            shared: handle.shared,
            outbound: handle.outbound,
            send_high_water: handle.send_high_water,
            disconnect_sent: false,
            open_time: Instant::now(),
            bytecount_rx: 0,
            bytecount_tx: 0,
        }
    }

    // Ask the TNC to disconnect, once
    fn start_disconnect(&mut self) {
        if self.disconnect_sent || !self.is_open() {
            return;
        }
        self.disconnect_sent = true;
        info!("Disconnecting {}", &self.info);
        let _ = self
            .outbound
            .unbounded_send(Outbound::Command(command::disconnect().to_string()));
    }
}

impl AsyncRead for ArqStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }

        loop {
            if !this.current.is_empty() {
                let n = min(buf.len(), this.current.len());
                let chunk = this.current.split_to(n);
                buf[..n].copy_from_slice(chunk.as_ref());
                this.bytecount_rx += n as u64;
                return Poll::Ready(Ok(n));
            }

            match ready!(Pin::new(&mut this.inbound).poll_next(cx)) {
                Some(chunk) => this.current = chunk,
                None => return Poll::Ready(Ok(0)),
            }
        }
    }
}

impl AsyncWrite for ArqStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if !this.is_open() || this.disconnect_sent {
            return Poll::Ready(Err(broken_pipe_err()));
        }
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }

        this.shared.register_writable(cx.waker());
        let pending = this.shared.pending();
        if pending >= this.send_high_water {
            return Poll::Pending;
        }

        let room = (this.send_high_water - pending) as usize;
        let n = min(buf.len(), room);
        if this
            .outbound
            .unbounded_send(Outbound::Data(Bytes::copy_from_slice(&buf[..n])))
            .is_err()
        {
            return Poll::Ready(Err(broken_pipe_err()));
        }
        this.shared.add_pending(n as u64);
        this.bytecount_tx += n as u64;
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        this.shared.register_writable(cx.waker());
        if this.shared.pending() == 0 {
            Poll::Ready(Ok(()))
        } else if !this.is_open() {
            Poll::Ready(Err(broken_pipe_err()))
        } else {
            Poll::Pending
        }
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        this.start_disconnect();

        this.shared.register_closing(cx.waker());
        if !this.is_open() || this.outbound.is_closed() {
            Poll::Ready(Ok(()))
        } else {
            Poll::Pending
        }
    }
}

impl Drop for ArqStream {
    fn drop(&mut self) {
        self.start_disconnect();
    }
}

impl fmt::Display for ArqStream {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} rx:{} tx:{} unack:{}",
            &self.info,
            self.bytecount_rx,
            self.bytecount_tx,
            self.bytes_unacknowledged()
        )
    }
}

fn broken_pipe_err() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "ARQ connection is closed")
}

#[cfg(test)]
mod test {
    use super::*;

    use futures::executor;
    use futures::io::{AsyncReadExt, AsyncWriteExt};
    use futures::sink::SinkExt;
    use futures::stream::StreamExt;

    use crate::arq::CallDirection;

    struct Fixture {
        stream: ArqStream,
        inbound: mpsc::Sender<Bytes>,
        shared: Arc<SessionShared>,
        written: mpsc::UnboundedReceiver<Outbound>,
    }

    fn fixture(high_water: u64) -> Fixture {
        let (in_tx, in_rx) = mpsc::channel(16);
        let (out_tx, out_rx) = mpsc::unbounded();
        let shared = SessionShared::new();
        let handle = SessionHandle {
            info: ConnectionInfo::new(
                "W9ABC",
                None,
                500,
                CallDirection::Outgoing("W1AW".to_owned()),
            ),
            inbound: in_rx,
            shared: shared.clone(),
            outbound: out_tx,
            send_high_water: high_water,
        };
        Fixture {
            stream: ArqStream::new(handle),
            inbound: in_tx,
            shared,
            written: out_rx,
        }
    }

    #[test]
    fn test_read() {
        let Fixture {
            mut stream,
            mut inbound,
            shared,
            written: _written,
        } = fixture(1024);
        executor::block_on(async move {
            inbound.send(Bytes::from_static(b"HELLO")).await.unwrap();
            inbound.send(Bytes::from_static(b"WORLD")).await.unwrap();

            let mut buf = [0u8; 3];
            assert_eq!(3, stream.read(&mut buf).await.unwrap());
            assert_eq!(b"HEL", &buf);

            // session ends; buffered data still drains
            shared.close();
            drop(inbound);
            let mut rest = vec![];
            stream.read_to_end(&mut rest).await.unwrap();
            assert_eq!(b"LOWORLD".to_vec(), rest);
            assert_eq!(10, stream.bytes_received());
            assert!(!stream.is_open());
        });
    }

    #[test]
    fn test_write() {
        let Fixture {
            mut stream,
            inbound: _inbound,
            shared,
            mut written,
        } = fixture(8);
        executor::block_on(async move {
            assert_eq!(6, stream.write(b"ABCDEF").await.unwrap());
            assert_eq!(6, stream.bytes_unacknowledged());

            // only two bytes of room below the high-water mark
            assert_eq!(2, stream.write(b"GHIJ").await.unwrap());
            assert_eq!(
                Some(Outbound::Data(Bytes::from_static(b"ABCDEF"))),
                written.next().await
            );
            assert_eq!(
                Some(Outbound::Data(Bytes::from_static(b"GH"))),
                written.next().await
            );

            // TNC reports everything acknowledged
            shared.set_pending(0);
            stream.flush().await.unwrap();
            assert_eq!(8, stream.bytes_transmitted());
        });
    }

    #[test]
    fn test_blocked_write_released_by_close() {
        let Fixture {
            mut stream,
            inbound: _inbound,
            shared,
            written: _written,
        } = fixture(4);
        executor::block_on(async move {
            assert_eq!(4, stream.write(b"ABCD").await.unwrap());

            // no room below the high-water mark until the session ends
            let writer = async {
                match stream.write(b"EF").await {
                    Err(e) => assert_eq!(io::ErrorKind::BrokenPipe, e.kind()),
                    Ok(n) => panic!("wrote {} bytes after close", n),
                }
            };
            let teardown = async {
                shared.close();
            };
            futures::join!(writer, teardown);
            assert_eq!(4, stream.bytes_transmitted());
        });
    }

    #[test]
    fn test_write_after_close() {
        let Fixture {
            mut stream,
            inbound: _inbound,
            shared,
            written: _written,
        } = fixture(1024);
        shared.close();
        executor::block_on(async move {
            match stream.write(b"LATE").await {
                Err(e) => assert_eq!(io::ErrorKind::BrokenPipe, e.kind()),
                Ok(_) => assert!(false),
            }
        });
    }

    #[test]
    fn test_close() {
        let Fixture {
            mut stream,
            inbound: _inbound,
            shared,
            mut written,
        } = fixture(1024);
        executor::block_on(async {
            let closer = async {
                stream.close().await.unwrap();
            };
            let tnc = async {
                match written.next().await {
                    Some(Outbound::Command(c)) => assert_eq!("DISCONNECT", c),
                    _ => assert!(false),
                }
                shared.close();
            };
            futures::join!(closer, tnc);
        });
        assert!(!stream.is_disconnecting());
        assert!(!stream.is_open());

        // dropping a closed stream sends nothing more
        drop(stream);
        assert!(written.try_next().unwrap().is_none());
    }

    #[test]
    fn test_drop_disconnects() {
        let Fixture {
            stream,
            inbound: _inbound,
            shared: _shared,
            mut written,
        } = fixture(1024);
        drop(stream);
        match written.try_next() {
            Ok(Some(Outbound::Command(c))) => assert_eq!("DISCONNECT", c),
            _ => assert!(false),
        }
    }
}
