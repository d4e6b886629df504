//! Outbound stream task
//!
//! All outbound traffic funnels through one task, so command
//! lines and payload chunks are never interleaved mid-frame.

use std::io;
use std::pin::Pin;

use futures::channel::mpsc;
use futures::prelude::*;

use crate::framing::Outbound;

/// A boxed outbound sink
pub(crate) type OutSink = Pin<Box<dyn Sink<Outbound, Error = io::Error> + Send>>;

/// Write queued traffic until the queue closes or a write fails
///
/// Payload goes to `data` when a separate data port exists.
/// Everything else goes to `control`. When the queue closes,
/// both sinks are flushed and closed.
pub(crate) async fn writer_task(
    mut queue: mpsc::UnboundedReceiver<Outbound>,
    mut control: OutSink,
    mut data: Option<OutSink>,
) {
    while let Some(out) = queue.next().await {
        match &out {
            Outbound::Command(line) => debug!("--> {}", line),
            Outbound::Data(bytes) => trace!("--> {} bytes of payload", bytes.len()),
        }

        let res = match data.as_mut() {
            Some(sink) if out.is_data() => sink.send(out).await,
            _ => control.send(out).await,
        };
        if let Err(e) = res {
            error!("Write to TNC failed: {}", &e);
            break;
        }
    }

    if let Err(e) = control.close().await {
        debug!("Closing TNC control stream: {}", e);
    }
    if let Some(mut sink) = data {
        if let Err(e) = sink.close().await {
            debug!("Closing TNC data stream: {}", e);
        }
    }
}
