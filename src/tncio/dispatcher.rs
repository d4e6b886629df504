//! The dispatcher task
//!
//! The dispatcher is the single owner of TNC session state.
//! It merges the output of every reader, tracks the TNC's
//! state, delivers ARQ payload to the active session, and
//! publishes every control-port response. Other tasks observe
//! its state through published notices, through requests sent
//! to it, or through the atomic `Status` snapshot.

use std::collections::HashMap;
use std::fmt;
use std::string::String;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use async_std::future;
use bytes::Bytes;
use futures::channel::{mpsc, oneshot};
use futures::prelude::*;
use futures::select;

use super::broadcaster::Broadcaster;
use super::reader::ReadEvent;
use super::session::{SessionHandle, SessionShared};

use crate::arq::{CallDirection, ConnectionInfo};
use crate::framing::Outbound;
use crate::protocol::command;
use crate::protocol::command::Command;
use crate::protocol::constants::State;
use crate::protocol::frame::{DataIn, DecodeError, Frame};
use crate::protocol::response::{ConnectedPeer, Response};
use crate::tnc::{Notice, PttController, SessionOffer, TncConfig};

/// Table of heard stations and when they were last heard
pub type HeardTable = HashMap<String, SystemTime>;

/// Atomic snapshot of dispatcher state
///
/// Written only by the dispatcher.
pub(crate) struct Status {
    state: AtomicU8,
    busy: AtomicBool,
    connected: AtomicBool,
    closed: AtomicBool,
    decode_faults: AtomicU64,
}

impl Status {
    pub fn new() -> Arc<Self> {
        Arc::new(Status {
            state: AtomicU8::new(State::OFFLINE.to_u8()),
            busy: AtomicBool::new(false),
            connected: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            decode_faults: AtomicU64::new(0),
        })
    }

    pub fn state(&self) -> State {
        State::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn decode_faults(&self) -> u64 {
        self.decode_faults.load(Ordering::SeqCst)
    }
}

/// Requests from the facade to the dispatcher
pub(crate) enum DispatchRequest {
    /// Copy of the heard table
    Heard(oneshot::Sender<HeardTable>),

    /// Install or remove the PTT controller
    SetPtt(Option<Box<dyn PttController>>),

    /// State reported by a `STATE` query at startup
    ///
    /// Ignored once any `NEWSTATE` has been seen.
    SeedState(State),

    /// Tear down the active session now
    EndSession,

    /// Stop the dispatcher and every reader
    Shutdown,
}

impl fmt::Debug for DispatchRequest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DispatchRequest::Heard(_) => write!(f, "Heard"),
            DispatchRequest::SetPtt(ptt) => write!(f, "SetPtt({})", ptt.is_some()),
            DispatchRequest::SeedState(state) => write!(f, "SeedState({})", state),
            DispatchRequest::EndSession => write!(f, "EndSession"),
            DispatchRequest::Shutdown => write!(f, "Shutdown"),
        }
    }
}

// The dispatcher's end of an open session
struct ActiveSession {
    inbound: mpsc::Sender<Bytes>,
    shared: Arc<SessionShared>,
}

type InboundChannel = (mpsc::Sender<Bytes>, mpsc::Receiver<Bytes>);

/// Owner of all mutable TNC session state
pub(crate) struct Dispatcher {
    config: TncConfig,
    status: Arc<Status>,
    state: State,
    state_seen: bool,
    busy: bool,
    mycall: Option<String>,
    target: Option<String>,
    heard: HeardTable,
    session: Option<ActiveSession>,
    spare: Option<InboundChannel>,
    ptt: Option<Box<dyn PttController>>,
    outbound: mpsc::UnboundedSender<Outbound>,
    notices: Broadcaster<Notice>,
    reader_stops: Vec<oneshot::Sender<()>>,
}

impl Dispatcher {
    /// New dispatcher
    ///
    /// Commands the dispatcher originates (resend requests and
    /// forced disconnects) are queued on `outbound`. Dropping
    /// `reader_stops` on shutdown stops the readers.
    pub fn new(
        config: TncConfig,
        status: Arc<Status>,
        outbound: mpsc::UnboundedSender<Outbound>,
        notices: Broadcaster<Notice>,
        reader_stops: Vec<oneshot::Sender<()>>,
    ) -> Self {
        let spare = Some(mpsc::channel(config.inbound_capacity()));
        Dispatcher {
            config,
            status,
            state: State::OFFLINE,
            state_seen: false,
            busy: false,
            mycall: None,
            target: None,
            heard: HashMap::new(),
            session: None,
            spare,
            ptt: None,
            outbound,
            notices,
            reader_stops,
        }
    }

    /// Run until any stream closes or shutdown is requested
    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<ReadEvent>,
        mut requests: mpsc::UnboundedReceiver<DispatchRequest>,
    ) {
        loop {
            select! {
                evt = events.next() => match evt {
                    Some(ReadEvent::Frame(frame)) => self.handle_frame(frame).await,
                    Some(ReadEvent::Fault(e)) => self.handle_fault(e),
                    Some(ReadEvent::Closed(role)) => {
                        info!("TNC {:?} stream closed", role);
                        break;
                    }
                    None => break,
                },
                req = requests.next() => match req {
                    Some(DispatchRequest::Shutdown) | None => break,
                    Some(req) => self.handle_request(req),
                },
            }
        }
        self.shutdown();
    }

    async fn handle_frame(&mut self, frame: Frame) {
        match frame {
            Frame::Response(resp) => self.handle_response(resp),
            Frame::Payload(DataIn::Arq(data)) => self.deliver(data).await,
            Frame::Payload(DataIn::Fec(data)) => {
                debug!("Discarding {} bytes of FEC payload", data.len());
            }
            Frame::Heard { call, grid } => {
                debug!(
                    "Heard {} [{}]",
                    &call,
                    grid.as_ref().map(String::as_str).unwrap_or("????")
                );
                self.heard.insert(call, SystemTime::now());
            }
        }
    }

    fn handle_fault(&mut self, e: DecodeError) {
        self.status.decode_faults.fetch_add(1, Ordering::SeqCst);
        if e.is_recoverable() {
            warn!("Decode fault: {}. Requesting resend.", &e);
            self.send(command::crcfault());
        } else {
            error!("Unrecoverable decode fault: {}", &e);
        }
    }

    fn handle_request(&mut self, req: DispatchRequest) {
        match req {
            DispatchRequest::Heard(reply) => {
                let _ = reply.send(self.heard.clone());
            }
            DispatchRequest::SetPtt(ptt) => self.ptt = ptt,
            DispatchRequest::SeedState(state) => {
                if !self.state_seen {
                    self.set_state(state);
                }
            }
            DispatchRequest::EndSession => self.eof(),
            DispatchRequest::Shutdown => self.shutdown(),
        }
    }

    fn handle_response(&mut self, resp: Response) {
        match &resp {
            Response::Ptt(transmit) => self.key_transmitter(*transmit),
            Response::Disconnected => {
                self.state_seen = true;
                self.set_state(State::DISC);
                self.eof();
            }
            Response::Buffer(pending) => {
                if let Some(session) = &self.session {
                    session.shared.set_pending(*pending);
                }
            }
            Response::NewState(state) => {
                self.state_seen = true;
                self.set_state(*state);
                if state.is_idle() {
                    self.eof();
                }
            }
            Response::Busy(busy) => {
                if *busy != self.busy {
                    debug!("RF channel {}", if *busy { "busy" } else { "clear" });
                }
                self.busy = *busy;
                self.status.busy.store(*busy, Ordering::SeqCst);
            }
            Response::Target(target) => self.target = Some(target.clone()),
            Response::MyCall(Some(mycall)) => self.mycall = Some(mycall.clone()),
            Response::Connected(peer) => self.open_session(peer),
            _ => {}
        }
        self.notices.publish(Notice::Response(resp));
    }

    // Install a fresh session and offer it to the facade
    fn open_session(&mut self, peer: &ConnectedPeer) {
        if self.session.is_some() {
            warn!("CONNECTED to {} while a session is open; ignored", &peer.call);
            return;
        }

        let direction = match self.target.take() {
            Some(target) => CallDirection::Incoming(target),
            None => CallDirection::Outgoing(self.mycall.clone().unwrap_or_default()),
        };
        let info = ConnectionInfo::new(
            peer.call.clone(),
            peer.grid.clone(),
            peer.bandwidth,
            direction,
        );
        info!("CONNECTED {}", &info);

        let (tx, rx) = match self.spare.take() {
            Some(chan) => chan,
            None => mpsc::channel(self.config.inbound_capacity()),
        };
        let shared = SessionShared::new();
        self.session = Some(ActiveSession {
            inbound: tx,
            shared: shared.clone(),
        });
        self.status.connected.store(true, Ordering::SeqCst);

        let handle = SessionHandle {
            info,
            inbound: rx,
            shared,
            outbound: self.outbound.clone(),
            send_high_water: self.config.send_high_water(),
        };
        self.notices
            .publish(Notice::SessionOpened(SessionOffer::new(handle)));
    }

    // Hand ARQ payload to the session reader, waiting at most
    // the grace period for buffer space
    async fn deliver(&mut self, data: Bytes) {
        let grace = self.config.inbound_grace();
        let res = match self.session.as_mut() {
            None => {
                debug!("Discarding {} bytes of ARQ payload: no session", data.len());
                return;
            }
            Some(session) => future::timeout(grace, session.inbound.send(data)).await,
        };

        match res {
            Ok(Ok(())) => {}
            Ok(Err(_gone)) => {
                warn!("ARQ session has no reader. Disconnecting.");
                self.eof();
                self.send(command::disconnect());
            }
            Err(_timeout) => {
                warn!(
                    "Inbound buffer full for {:?}; reader stalled. Disconnecting.",
                    grace
                );
                self.eof();
                self.send(command::disconnect());
                self.notices.publish(Notice::InboundStalled);
            }
        }
    }

    // Tear down the active session, if any
    //
    // The inbound buffer is closed. Its reader sees EOF once
    // the chunks already buffered are consumed. Blocked
    // writers are released. A fresh buffer is allocated for
    // the next session.
    fn eof(&mut self) {
        if let Some(session) = self.session.take() {
            info!("ARQ session ended");
            session.shared.close();
            drop(session.inbound);
        }
        self.status.connected.store(false, Ordering::SeqCst);
        if self.spare.is_none() {
            self.spare = Some(mpsc::channel(self.config.inbound_capacity()));
        }
    }

    fn shutdown(&mut self) {
        if self.status.closed() {
            return;
        }
        self.eof();
        self.reader_stops.clear();
        self.status.closed.store(true, Ordering::SeqCst);
        self.notices.close();
        self.outbound.close_channel();
        info!("TNC dispatcher stopped");
    }

    fn set_state(&mut self, state: State) {
        if state != self.state {
            debug!("TNC state {} -> {}", self.state, state);
        }
        self.state = state;
        self.status.state.store(state.to_u8(), Ordering::SeqCst);
    }

    fn key_transmitter(&mut self, transmit: bool) {
        match self.ptt.as_mut() {
            Some(ptt) => {
                if let Err(e) = ptt.set_ptt(transmit) {
                    error!("PTT {} failed: {}", transmit, e);
                }
            }
            None => trace!("PTT {} (no controller)", transmit),
        }
    }

    fn send<I>(&self, cmd: Command<I>)
    where
        I: fmt::Display,
    {
        if self.outbound.unbounded_send(Outbound::Command(cmd.to_string())).is_err() {
            debug!("Dropped {}: writer is gone", cmd.command_id());
        }
    }
}
