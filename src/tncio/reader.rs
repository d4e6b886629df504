//! Inbound stream tasks
//!
//! One reader runs per physical stream. It frames the stream,
//! classifies each frame, and forwards the result to the
//! dispatcher. Streams are read independently; nothing orders
//! frames of one stream against another.

use futures::channel::{mpsc, oneshot};
use futures::io::AsyncRead;
use futures::prelude::*;
use futures::select;
use futures_codec::{Decoder, FramedRead};

use crate::protocol::frame::{DecodeError, Frame, RawFrame};

/// Which physical stream a reader serves
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub(crate) enum StreamRole {
    /// The control port
    Control,

    /// The data port
    Data,

    /// A single stream carrying both
    Combined,
}

/// Reader output, as consumed by the dispatcher
#[derive(Debug)]
pub(crate) enum ReadEvent {
    /// A classified frame
    Frame(Frame),

    /// A frame failed to decode
    Fault(DecodeError),

    /// The stream has ended. No further events follow from it.
    Closed(StreamRole),
}

/// Read `stream` until it ends, fails, or `stop` fires
///
/// Recoverable decode faults are reported and reading
/// continues. A transport error is reported and ends the
/// stream. `ReadEvent::Closed` is always the last event sent.
pub(crate) async fn reader_task<R, D>(
    stream: R,
    decoder: D,
    role: StreamRole,
    events: mpsc::UnboundedSender<ReadEvent>,
    stop: oneshot::Receiver<()>,
) where
    R: AsyncRead + Unpin,
    D: Decoder<Item = RawFrame, Error = DecodeError>,
{
    let mut frames = FramedRead::new(stream, decoder).fuse();
    let mut stop = stop.fuse();

    loop {
        let next = select! {
            _ = stop => {
                debug!("{:?} reader stopped", role);
                break;
            }
            next = frames.next() => next,
        };

        let event = match next {
            None => {
                debug!("{:?} stream closed by TNC", role);
                break;
            }
            Some(Ok(raw)) => {
                log_inbound(&raw);
                match Frame::classify(raw) {
                    Ok(frame) => ReadEvent::Frame(frame),
                    Err(e) => ReadEvent::Fault(e),
                }
            }
            Some(Err(e)) => {
                if e.is_recoverable() {
                    ReadEvent::Fault(e)
                } else {
                    error!("{:?} stream failed: {}", role, &e);
                    let _ = events.unbounded_send(ReadEvent::Fault(e));
                    break;
                }
            }
        };

        if events.unbounded_send(event).is_err() {
            // dispatcher is gone
            return;
        }
    }

    let _ = events.unbounded_send(ReadEvent::Closed(role));
}

fn log_inbound(raw: &RawFrame) {
    match raw {
        RawFrame::Line(line) => debug!("<-- {}", line),
        RawFrame::Data { kind, payload } => trace!("<-- {:?} frame, {} bytes", kind, payload.len()),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use async_std::task;
    use futures::io::Cursor;

    use crate::framing::control::TncControlFraming;
    use crate::framing::data::TncDataFraming;
    use crate::protocol::constants::State;
    use crate::protocol::response::Response;

    #[test]
    fn test_control_reader() {
        task::block_on(async {
            let (tx, mut rx) = mpsc::unbounded();
            let (_stop_tx, stop_rx) = oneshot::channel();
            let curs = Cursor::new(b"NEWSTATE DISC\rBUSY maybe\rPTT TRUE\r".to_vec());
            reader_task(curs, TncControlFraming::new(), StreamRole::Control, tx, stop_rx).await;

            match rx.next().await {
                Some(ReadEvent::Frame(Frame::Response(Response::NewState(State::DISC)))) => {
                    assert!(true)
                }
                _ => assert!(false),
            }
            match rx.next().await {
                Some(ReadEvent::Fault(DecodeError::Malformed(_))) => assert!(true),
                _ => assert!(false),
            }
            match rx.next().await {
                Some(ReadEvent::Frame(Frame::Response(Response::Ptt(true)))) => assert!(true),
                _ => assert!(false),
            }
            match rx.next().await {
                Some(ReadEvent::Closed(StreamRole::Control)) => assert!(true),
                _ => assert!(false),
            }
            assert!(rx.next().await.is_none());
        })
    }

    #[test]
    fn test_data_reader() {
        task::block_on(async {
            let (tx, mut rx) = mpsc::unbounded();
            let (_stop_tx, stop_rx) = oneshot::channel();
            let curs = Cursor::new(b"\x00\x0cIDFID:N0CALL".to_vec());
            reader_task(curs, TncDataFraming::new(), StreamRole::Data, tx, stop_rx).await;

            match rx.next().await {
                Some(ReadEvent::Frame(Frame::Heard { call, grid })) => {
                    assert_eq!("N0CALL", call);
                    assert!(grid.is_none());
                }
                _ => assert!(false),
            }
            match rx.next().await {
                Some(ReadEvent::Closed(StreamRole::Data)) => assert!(true),
                _ => assert!(false),
            }
        })
    }

    #[test]
    fn test_stop() {
        task::block_on(async {
            let (tx, mut rx) = mpsc::unbounded();
            let (stop_tx, stop_rx) = oneshot::channel::<()>();

            let reader = task::spawn(reader_task(
                PendingIo {},
                TncControlFraming::new(),
                StreamRole::Control,
                tx,
                stop_rx,
            ));

            drop(stop_tx);
            reader.await;
            match rx.next().await {
                Some(ReadEvent::Closed(StreamRole::Control)) => assert!(true),
                _ => assert!(false),
            }
        })
    }

    // never ready
    struct PendingIo {}

    impl AsyncRead for PendingIo {
        fn poll_read(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut futures::task::Context,
            _buf: &mut [u8],
        ) -> futures::task::Poll<std::io::Result<usize>> {
            futures::task::Poll::Pending
        }
    }
}
