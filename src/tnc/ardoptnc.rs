//! Asynchronous ARDOP TNC Interface

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::string::String;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_std::net::TcpStream;
use async_std::task::{self, JoinHandle};
use futures::channel::{mpsc, oneshot};
use futures::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use futures::lock::Mutex;
use futures::prelude::*;
use futures_codec::{Decoder, FramedWrite};

use super::config::TncConfig;
use super::error::{TncError, TncResult};
use super::notice::Notice;
use super::ptt::PttController;

use crate::arq::ArqStream;
use crate::framing::combined::TncCombinedFraming;
use crate::framing::control::TncControlFraming;
use crate::framing::data::TncDataFraming;
use crate::framing::Outbound;
use crate::protocol::command;
use crate::protocol::command::Command;
use crate::protocol::constants::{Bandwidth, CommandID, ProtocolMode, State};
use crate::protocol::frame::{DecodeError, RawFrame};
use crate::protocol::response::Response;
use crate::tncio::broadcaster::{Broadcaster, Subscription};
use crate::tncio::dispatcher::{DispatchRequest, Dispatcher, HeardTable, Status};
use crate::tncio::reader::{reader_task, ReadEvent, StreamRole};
use crate::tncio::writer::{writer_task, OutSink};

// Offset between control port and data port
const DATA_PORT_OFFSET: u16 = 1;

// The data port which accompanies the control port at `addr`
fn data_port_addr(addr: &SocketAddr) -> TncResult<SocketAddr> {
    match addr.port().checked_add(DATA_PORT_OFFSET) {
        Some(port) => Ok(SocketAddr::new(addr.ip(), port)),
        None => Err(TncError::IoError(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("no data port follows control port {}", addr.port()),
        ))),
    }
}

/// TNC Interface
///
/// All methods take `&self`. The interface may be shared
/// between tasks with an `Arc`. Requests which share a
/// command verb are serialized, since the TNC's replies carry
/// nothing but the verb to tell them apart. Requests with
/// different verbs may run concurrently.
pub struct ArdopTnc {
    inner: Arc<Inner>,
}

struct Inner {
    config: TncConfig,
    status: Arc<Status>,
    notices: Broadcaster<Notice>,
    outbound: mpsc::UnboundedSender<Outbound>,
    requests: mpsc::UnboundedSender<DispatchRequest>,
    command_locks: StdMutex<HashMap<CommandID, Arc<Mutex<()>>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    closing: AtomicBool,
}

impl ArdopTnc {
    /// Connect to an ARDOP TNC over TCP
    ///
    /// Dials the TNC's control port at `addr` and its data
    /// port at the next port number, then initializes the TNC.
    ///
    /// # Parameters
    /// - `addr`: Network address of the ARDOP TNC's control port.
    /// - `mycall`: The formally-assigned callsign for your station.
    ///   Legitimate call signs include from 3 to 7 ASCII characters
    ///   (A-Z, 0-9) followed by an optional "`-`" and an SSID of
    ///   `-0` to `-15` or `-A` to `-Z`. An SSID of `-0` is treated
    ///   as no SSID.
    /// - `grid`: Maidenhead grid square of your station, if it
    ///   should be programmed into the TNC.
    /// - `config`: Driver settings
    ///
    /// # Returns
    /// A new `ArdopTnc`, or an error if the connection or
    /// initialization step fails.
    pub async fn connect_tcp(
        addr: &SocketAddr,
        mycall: &str,
        grid: Option<&str>,
        config: TncConfig,
    ) -> TncResult<Self> {
        let data_addr = data_port_addr(addr)?;
        let control = TcpStream::connect(*addr).await?;
        let data = TcpStream::connect(data_addr).await?;
        ArdopTnc::open(control, Some(data), mycall, grid, config).await
    }

    /// Attach to an ARDOP TNC over existing streams
    ///
    /// Starts the driver's I/O tasks on the current `async-std`
    /// runtime and initializes the TNC: `INITIALIZE`, then
    /// `CODEC TRUE` if the TNC reports that it is `OFFLINE`,
    /// `PROTOCOLMODE ARQ`, the configured `ARQTIMEOUT`,
    /// `LISTEN FALSE`, `MYCALL`, and `GRIDSQUARE`.
    ///
    /// # Parameters
    /// - `control`: Stream to the TNC's control port
    /// - `data`: Stream to the TNC's data port. If `None`,
    ///   control and data are multiplexed over `control`
    ///   with `c:` / `d:` frame prefixes.
    /// - `mycall`: The formally-assigned callsign for your station.
    /// - `grid`: Maidenhead grid square, if any
    /// - `config`: Driver settings
    ///
    /// # Returns
    /// A new `ArdopTnc`, or an error if initialization fails.
    /// If the TNC hangs up during initialization, the error is
    /// `TncError::ControlPortBusy`. The ARDOP TNC only serves
    /// one host at a time.
    pub async fn open<T>(
        control: T,
        data: Option<T>,
        mycall: &str,
        grid: Option<&str>,
        config: TncConfig,
    ) -> TncResult<Self>
    where
        T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let tnc = ArdopTnc::start(control, data, config);
        match tnc.initialize(mycall, grid).await {
            Ok(()) => {
                info!("Initialized ARDOP TNC as {}", mycall);
                Ok(tnc)
            }
            Err(e) => {
                error!("Unable to initialize ARDOP TNC: {}", &e);
                tnc.inner.closing.store(true, Ordering::SeqCst);
                tnc.inner.shutdown().await;
                match e {
                    TncError::Closed => Err(TncError::ControlPortBusy),
                    e => Err(e),
                }
            }
        }
    }

    /// Dial a remote `target` peer
    ///
    /// When run, this future will
    ///
    /// 1. Make an outgoing `ARQCALL` to the designated callsign
    /// 2. Wait for a connection to either complete or fail
    ///
    /// The TNC must be idle (`OFFLINE` or `DISC`). If it is not,
    /// this method fails with `TncError::ConnectInProgress`
    /// without sending anything.
    ///
    /// # Parameters
    /// - `target`: Peer callsign, with optional `-SSID` portion
    /// - `attempts`: Number of connection attempts to make
    ///   before giving up
    ///
    /// # Return
    /// A new `ArqStream` that can be used like an asynchronous
    /// `TcpStream`. If the TNC gives up on the peer, returns
    /// `TncError::ConnectTimeout`.
    pub async fn connect<S>(&self, target: S, attempts: u16) -> TncResult<ArqStream>
    where
        S: Into<String>,
    {
        let inner = self.live()?;
        let lock = inner.command_lock(CommandID::ARQCALL);
        let _guard = lock.lock().await;
        if !inner.status.state().is_idle() {
            return Err(TncError::ConnectInProgress);
        }

        let target = target.into();
        let mut events = inner.subscribe()?;
        inner.send(command::arqcall(target.as_str(), attempts))?;
        info!("Connecting to {}", &target);

        while let Some(notice) = events.next().await {
            match notice {
                Notice::SessionOpened(offer) => {
                    return offer
                        .claim()
                        .ok_or(TncError::CommandResponseInvalid(CommandID::CONNECTED));
                }
                Notice::Response(Response::Fault(msg)) => {
                    return Err(TncError::CommandFailed(msg));
                }
                Notice::Response(Response::Rejected(reason)) => {
                    info!("Connection to {} rejected: {}", &target, reason);
                }
                Notice::Response(Response::NewState(state)) if state.is_idle() => {
                    info!("Connection to {} failed", &target);
                    return Err(TncError::ConnectTimeout);
                }
                _ => continue,
            }
        }
        Err(TncError::Closed)
    }

    /// Listen for one incoming connection
    ///
    /// Enables `LISTEN`, waits for a peer to connect to
    /// `MYCALL` or one of `MYAUX`, then disables `LISTEN`
    /// again.
    ///
    /// # Return
    /// The new connection's `ArqStream`
    pub async fn listen(&self) -> TncResult<ArqStream> {
        let inner = self.live()?;
        let mut events = inner.subscribe()?;
        inner.set(command::listen(true)).await?;

        let stream = loop {
            match events.next().await {
                Some(Notice::SessionOpened(offer)) => {
                    if let Some(stream) = offer.claim() {
                        break stream;
                    }
                }
                Some(_) => continue,
                None => return Err(TncError::Closed),
            }
        };
        drop(events);

        inner.set(command::listen(false)).await?;
        Ok(stream)
    }

    /// Disconnect the current ARQ session
    ///
    /// Sends `DISCONNECT` and waits for the TNC to report
    /// that the session has ended. Does nothing if the TNC
    /// is already idle.
    pub async fn disconnect(&self) -> TncResult<()> {
        self.live()?.disconnect().await
    }

    /// Uncleanly abort the current connection
    ///
    /// The TNC stops immediately, without telling the peer.
    /// Any open `ArqStream` reaches EOF.
    pub async fn abort(&self) -> TncResult<()> {
        let inner = self.live()?;
        inner.set(command::abort()).await?;
        inner.requests.unbounded_send(DispatchRequest::EndSession)?;
        Ok(())
    }

    /// Shut down the TNC interface
    ///
    /// Disables listening, disconnects any open session, and
    /// closes both streams to the TNC. Every subscription ends.
    /// All further operations fail with `TncError::Closed`.
    /// Calling this method more than once has no effect.
    pub async fn close(&self) {
        if self.inner.closing.swap(true, Ordering::SeqCst) {
            return;
        }

        let inner = &self.inner;
        if !inner.status.closed() {
            if let Err(e) = inner.set(command::listen(false)).await {
                debug!("Could not disable LISTEN at close: {}", e);
            }
            if let Err(e) = inner.disconnect().await {
                debug!("Could not disconnect at close: {}", e);
            }
        }
        inner.shutdown().await;
        info!("TNC interface closed");
    }

    /// Send an ID frame now, then every `period`
    ///
    /// Beaconing continues until the interface closes.
    pub async fn beacon_every(&self, period: Duration) -> TncResult<()> {
        self.live()?.set(command::sendid()).await?;

        let weak = Arc::downgrade(&self.inner);
        task::spawn(async move {
            loop {
                task::sleep(period).await;
                let inner = match weak.upgrade() {
                    Some(inner) => inner,
                    None => break,
                };
                if inner.closing.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(e) = inner.set(command::sendid()).await {
                    debug!("Beacon stopped: {}", e);
                    break;
                }
            }
        });
        Ok(())
    }

    /// Install or remove the transmitter controller
    ///
    /// The controller is called whenever the TNC sends `PTT`.
    /// Without one, `PTT` requests are ignored.
    pub fn set_ptt(&self, ptt: Option<Box<dyn PttController>>) -> TncResult<()> {
        self.live()?
            .requests
            .unbounded_send(DispatchRequest::SetPtt(ptt))?;
        Ok(())
    }

    /// Stations heard, and when they were last heard
    ///
    /// Stations are recorded from the ID frames they send,
    /// whether or not we are connected to them.
    pub async fn heard(&self) -> TncResult<HeardTable> {
        let (tx, rx) = oneshot::channel();
        self.live()?
            .requests
            .unbounded_send(DispatchRequest::Heard(tx))?;
        Ok(rx.await?)
    }

    /// Subscribe to everything the TNC reports
    ///
    /// The subscription observes notices published after
    /// this call. It ends when the interface closes.
    pub fn events(&self) -> Subscription<Notice> {
        self.inner.notices.subscribe()
    }

    /// Subscribe to TNC state transitions
    ///
    /// Yields each `NEWSTATE` the TNC reports after this call.
    pub fn state_changes(&self) -> impl Stream<Item = State> + Unpin {
        self.events()
            .filter_map(|notice| future::ready(notice.state_change()))
    }

    /// Last state reported by the TNC
    pub fn state(&self) -> State {
        self.inner.status.state()
    }

    /// True if the TNC is neither connected nor connecting
    pub fn is_idle(&self) -> bool {
        self.state().is_idle()
    }

    /// True while an ARQ session is open
    pub fn is_connected(&self) -> bool {
        self.inner.status.connected()
    }

    /// True if the TNC last reported a busy RF channel
    pub fn busy(&self) -> bool {
        self.inner.status.busy()
    }

    /// True once the interface is closed
    pub fn is_closed(&self) -> bool {
        self.inner.closing.load(Ordering::SeqCst) || self.inner.status.closed()
    }

    /// Count of inbound frames which failed to decode
    pub fn decode_faults(&self) -> u64 {
        self.inner.status.decode_faults()
    }

    /// Driver settings
    pub fn config(&self) -> &TncConfig {
        &self.inner.config
    }

    /// Ask the TNC for its current state
    pub async fn query_state(&self) -> TncResult<State> {
        self.live()?
            .get(CommandID::STATE, |resp| match resp {
                Response::State(state) => Some(state),
                _ => None,
            })
            .await
    }

    /// Query TNC version
    ///
    /// # Returns
    /// Version string, or an error if the version string
    /// could not be retrieved.
    pub async fn version(&self) -> TncResult<String> {
        self.live()?
            .get(CommandID::VERSION, |resp| match resp {
                Response::Version(v) => Some(v),
                _ => None,
            })
            .await
    }

    /// Send ID frame
    ///
    /// Sends an ID frame immediately, followed by a CW ID
    /// (if `set_cwid()` is set)
    pub async fn send_id(&self) -> TncResult<()> {
        self.live()?.set(command::sendid()).await
    }

    /// Current protocol mode
    pub async fn protocolmode(&self) -> TncResult<ProtocolMode> {
        self.live()?
            .get(CommandID::PROTOCOLMODE, |resp| match resp {
                Response::ProtocolMode(mode) => mode,
                _ => None,
            })
            .await
    }

    /// Set protocol mode
    pub async fn set_protocolmode(&self, mode: ProtocolMode) -> TncResult<()> {
        self.live()?.set(command::protocolmode(mode)).await
    }

    /// Station grid square
    pub async fn gridsquare(&self) -> TncResult<String> {
        self.live()?
            .get(CommandID::GRIDSQUARE, |resp| match resp {
                Response::GridSquare(grid) => grid,
                _ => None,
            })
            .await
    }

    /// Set station grid square
    ///
    /// Sets the 4, 6, or 8-character Maidenhead Grid Square for
    /// your station. A correct grid square is useful for studying
    /// and logging RF propagation-and for bragging rights.
    pub async fn set_gridsquare<S>(&self, grid: S) -> TncResult<()>
    where
        S: Into<String>,
    {
        self.live()?.set(command::gridsquare(grid)).await
    }

    /// Station callsign
    pub async fn mycall(&self) -> TncResult<String> {
        self.live()?
            .get(CommandID::MYCALL, |resp| match resp {
                Response::MyCall(call) => call,
                _ => None,
            })
            .await
    }

    /// Set station callsign
    pub async fn set_mycall<S>(&self, mycall: S) -> TncResult<()>
    where
        S: Into<String>,
    {
        self.live()?.set(command::mycall(mycall)).await
    }

    /// Auxiliary callsigns
    ///
    /// Returns an empty list if none are set.
    pub async fn myaux(&self) -> TncResult<Vec<String>> {
        self.live()?
            .get(CommandID::MYAUX, |resp| match resp {
                Response::MyAux(aux) => Some(aux.unwrap_or_default()),
                _ => None,
            })
            .await
    }

    /// Set auxiliary callsigns
    ///
    /// The TNC will also answer calls to these. An empty
    /// list clears them.
    pub async fn set_myaux(&self, aux: Vec<String>) -> TncResult<()> {
        self.live()?.set(command::myaux(aux)).await
    }

    /// ARQ bandwidth
    pub async fn arqbw(&self) -> TncResult<Bandwidth> {
        self.live()?
            .get(CommandID::ARQBW, |resp| match resp {
                Response::ArqBw(bw) => bw,
                _ => None,
            })
            .await
    }

    /// Set ARQ bandwidth
    pub async fn set_arqbw(&self, bw: Bandwidth) -> TncResult<()> {
        self.live()?.set(command::arqbw(bw)).await
    }

    /// ARQ timeout
    pub async fn arqtimeout(&self) -> TncResult<Duration> {
        self.live()?
            .get(CommandID::ARQTIMEOUT, |resp| match resp {
                Response::ArqTimeout(secs) => secs.map(Duration::from_secs),
                _ => None,
            })
            .await
    }

    /// Set ARQ timeout
    ///
    /// The TNC disconnects a session which makes no progress
    /// for this long. Resolution is one second.
    pub async fn set_arqtimeout(&self, timeout: Duration) -> TncResult<()> {
        self.live()?.set(command::arqtimeout(timeout)).await
    }

    /// True if the TNC's codec is running
    pub async fn codec(&self) -> TncResult<bool> {
        self.live()?
            .get(CommandID::CODEC, |resp| match resp {
                Response::Codec(on) => on,
                _ => None,
            })
            .await
    }

    /// Start or stop the TNC's codec
    pub async fn set_codec(&self, engage: bool) -> TncResult<()> {
        self.live()?.set(command::codec(engage)).await
    }

    /// True if the TNC answers incoming calls
    pub async fn listening(&self) -> TncResult<bool> {
        self.live()?
            .get(CommandID::LISTEN, |resp| match resp {
                Response::Listen(on) => on,
                _ => None,
            })
            .await
    }

    /// Enable or disable answering incoming calls
    ///
    /// Sessions opened by incoming calls are published as
    /// `Notice::SessionOpened` on `events()`. See also
    /// `listen()`.
    pub async fn set_listen(&self, listen: bool) -> TncResult<()> {
        self.live()?.set(command::listen(listen)).await
    }

    /// True if automatic link turnover is enabled
    pub async fn autobreak(&self) -> TncResult<bool> {
        self.live()?
            .get(CommandID::AUTOBREAK, |resp| match resp {
                Response::AutoBreak(on) => on,
                _ => None,
            })
            .await
    }

    /// Enable or disable automatic link turnover
    pub async fn set_autobreak(&self, autobreak: bool) -> TncResult<()> {
        self.live()?.set(command::autobreak(autobreak)).await
    }

    /// True if a CW ID follows each ID frame
    pub async fn cwid(&self) -> TncResult<bool> {
        self.live()?
            .get(CommandID::CWID, |resp| match resp {
                Response::CwId(on) => on,
                _ => None,
            })
            .await
    }

    /// Enable or disable CW ID
    ///
    /// If set, send a CW ID after every ID frame.
    pub async fn set_cwid(&self, cwid: bool) -> TncResult<()> {
        self.live()?.set(command::cwid(cwid)).await
    }

    // Spawn the reader, writer, and dispatcher tasks
    fn start<T>(control: T, data: Option<T>, config: TncConfig) -> Self
    where
        T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (events_tx, events_rx) = mpsc::unbounded();
        let (outbound_tx, outbound_rx) = mpsc::unbounded();
        let (requests_tx, requests_rx) = mpsc::unbounded();
        let mut tasks = vec![];
        let mut stops = vec![];

        let (control_rd, control_wr) = control.split();
        let (control_sink, data_sink) = match data {
            Some(data) => {
                let (data_rd, data_wr) = data.split();
                tasks.push(spawn_reader(
                    control_rd,
                    TncControlFraming::new(),
                    StreamRole::Control,
                    &events_tx,
                    &mut stops,
                ));
                tasks.push(spawn_reader(
                    data_rd,
                    TncDataFraming::new(),
                    StreamRole::Data,
                    &events_tx,
                    &mut stops,
                ));
                let control_sink: OutSink =
                    Box::pin(FramedWrite::new(control_wr, TncControlFraming::new()));
                let data_sink: OutSink =
                    Box::pin(FramedWrite::new(data_wr, TncDataFraming::new()));
                (control_sink, Some(data_sink))
            }
            None => {
                tasks.push(spawn_reader(
                    control_rd,
                    TncCombinedFraming::new(config.checksum()),
                    StreamRole::Combined,
                    &events_tx,
                    &mut stops,
                ));
                let control_sink: OutSink = Box::pin(FramedWrite::new(
                    control_wr,
                    TncCombinedFraming::new(config.checksum()),
                ));
                (control_sink, None)
            }
        };
        drop(events_tx);
        tasks.push(task::spawn(writer_task(
            outbound_rx,
            control_sink,
            data_sink,
        )));

        let status = Status::new();
        let notices = Broadcaster::new();
        let dispatcher = Dispatcher::new(
            config.clone(),
            status.clone(),
            outbound_tx.clone(),
            notices.clone(),
            stops,
        );
        tasks.push(task::spawn(dispatcher.run(events_rx, requests_rx)));

        ArdopTnc {
            inner: Arc::new(Inner {
                config,
                status,
                notices,
                outbound: outbound_tx,
                requests: requests_tx,
                command_locks: StdMutex::new(HashMap::new()),
                tasks: Mutex::new(tasks),
                closing: AtomicBool::new(false),
            }),
        }
    }

    async fn initialize(&self, mycall: &str, grid: Option<&str>) -> TncResult<()> {
        let inner = &self.inner;
        inner.set(command::initialize()).await?;

        let state = inner
            .get(CommandID::STATE, |resp| match resp {
                Response::State(state) => Some(state),
                _ => None,
            })
            .await?;
        inner.requests.unbounded_send(DispatchRequest::SeedState(state))?;
        if state == State::OFFLINE {
            inner.set(command::codec(true)).await?;
        }

        inner.set(command::protocolmode(ProtocolMode::ARQ)).await?;
        inner
            .set(command::arqtimeout(inner.config.arq_timeout()))
            .await?;
        inner.set(command::listen(false)).await?;
        inner.set(command::mycall(mycall)).await?;
        if let Some(grid) = grid {
            inner.set(command::gridsquare(grid)).await?;
        }
        Ok(())
    }

    // The interface, unless it is closed
    fn live(&self) -> TncResult<&Inner> {
        if self.is_closed() {
            Err(TncError::Closed)
        } else {
            Ok(&*self.inner)
        }
    }
}

impl fmt::Debug for ArdopTnc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ArdopTnc")
            .field("state", &self.state())
            .field("closed", &self.is_closed())
            .field("subscribers", &self.inner.notices.subscriber_count())
            .finish()
    }
}

impl Inner {
    // Send `cmd` and await the reply bearing its verb
    async fn execute<I, T, F>(&self, cmd: Command<I>, extract: F) -> TncResult<T>
    where
        I: fmt::Display,
        F: FnMut(Response) -> Option<TncResult<T>>,
    {
        let id = cmd.command_id();
        let lock = self.command_lock(id);
        let _guard = lock.lock().await;

        let mut replies = self.subscribe()?;
        self.send(cmd)?;
        await_reply(&mut replies, id, extract).await
    }

    // Send a command whose reply carries nothing we need
    async fn set<I>(&self, cmd: Command<I>) -> TncResult<()>
    where
        I: fmt::Display,
    {
        self.execute(cmd, |_| Some(Ok(()))).await
    }

    // Query a value. `value` returns `None` if the reply
    // lacks one.
    async fn get<T, F>(&self, id: CommandID, mut value: F) -> TncResult<T>
    where
        F: FnMut(Response) -> Option<T>,
    {
        self.execute(command::query(id), |resp| {
            Some(value(resp).ok_or(TncError::CommandResponseInvalid(id)))
        })
        .await
    }

    async fn disconnect(&self) -> TncResult<()> {
        if self.status.state().is_idle() {
            return Ok(());
        }

        let lock = self.command_lock(CommandID::DISCONNECT);
        let _guard = lock.lock().await;
        let mut events = self.subscribe()?;
        self.send(command::disconnect())?;

        while let Some(notice) = events.next().await {
            match notice {
                Notice::Response(Response::Disconnected) => return Ok(()),
                Notice::Response(Response::NewState(state)) if state.is_idle() => {
                    return Ok(())
                }
                Notice::Response(Response::Fault(msg)) => {
                    return Err(TncError::CommandFailed(msg))
                }
                _ => continue,
            }
        }
        Err(TncError::Closed)
    }

    // Stop every task and wait for them to finish
    async fn shutdown(&self) {
        let _ = self.requests.unbounded_send(DispatchRequest::Shutdown);
        self.outbound.close_channel();

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().await.drain(..).collect();
        for t in tasks {
            t.await;
        }
    }

    fn subscribe(&self) -> TncResult<Subscription<Notice>> {
        if self.status.closed() || self.notices.is_closed() {
            return Err(TncError::Closed);
        }
        Ok(self.notices.subscribe())
    }

    fn send<I>(&self, cmd: Command<I>) -> TncResult<()>
    where
        I: fmt::Display,
    {
        self.outbound
            .unbounded_send(Outbound::Command(cmd.to_string()))?;
        Ok(())
    }

    fn command_lock(&self, id: CommandID) -> Arc<Mutex<()>> {
        let mut locks = match self.command_locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

// Start a reader task for one stream
fn spawn_reader<R, D>(
    stream: R,
    decoder: D,
    role: StreamRole,
    events: &mpsc::UnboundedSender<ReadEvent>,
    stops: &mut Vec<oneshot::Sender<()>>,
) -> JoinHandle<()>
where
    R: AsyncRead + Send + Unpin + 'static,
    D: Decoder<Item = RawFrame, Error = DecodeError> + Send + 'static,
{
    let (stop_tx, stop_rx) = oneshot::channel();
    stops.push(stop_tx);
    task::spawn(reader_task(stream, decoder, role, events.clone(), stop_rx))
}

/// Await the reply to a command
///
/// Consumes `replies` until one of
///
/// 1. A response bearing the command's verb `id`, for which
///    `extract` returns `Some`. Its value is returned.
/// 2. A `FAULT`, which fails with `TncError::CommandFailed`.
/// 3. The end of the stream, which fails with
///    `TncError::Closed`.
async fn await_reply<S, T, F>(replies: &mut S, id: CommandID, mut extract: F) -> TncResult<T>
where
    S: Stream<Item = Notice> + Unpin,
    F: FnMut(Response) -> Option<TncResult<T>>,
{
    while let Some(notice) = replies.next().await {
        let resp = match notice {
            Notice::Response(resp) => resp,
            _ => continue,
        };
        match resp {
            Response::Fault(msg) => return Err(TncError::CommandFailed(msg)),
            resp if resp.command_id() == Some(id) => {
                if let Some(out) = extract(resp) {
                    return out;
                }
            }
            _ => continue,
        }
    }
    Err(TncError::Closed)
}
