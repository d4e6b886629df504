//! A scripted stand-in for the ARDOP TNC
//!
//! The mock listens on loopback TCP. Every control line the
//! host sends is recorded and passed to a handler, which
//! decides what the mock says back. Tests may also push
//! unsolicited lines and data frames at any time.

#![allow(dead_code)]

use std::net::Shutdown;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_std::net::{TcpListener, TcpStream};
use async_std::task;
use futures::channel::mpsc;
use futures::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use futures::stream::StreamExt;

/// Something the mock TNC sends to the host
#[derive(Debug, Clone)]
pub enum Inject {
    /// A control line, without terminator
    Line(String),

    /// A data frame of the given type (`ARQ`, `FEC`, `IDF`)
    Data(&'static str, Vec<u8>),

    /// Close both streams
    HangUp,
}

/// Reply with a control line
pub fn reply(line: &str) -> Inject {
    Inject::Line(line.to_owned())
}

/// Default handler: acknowledge sets and answer queries
///
/// `TOKEN ARGS` is echoed as `TOKEN now ARGS`. Queries are
/// answered from a table of plausible values.
pub fn echo(line: &str) -> Vec<Inject> {
    let mut parts = line.splitn(2, ' ');
    let token = parts.next().unwrap_or("");
    match parts.next() {
        Some(args) => match token {
            "ARQCALL" => vec![reply(line)],
            _ => vec![reply(&format!("{} now {}", token, args))],
        },
        None => match token {
            "STATE" => vec![reply("STATE DISC")],
            "VERSION" => vec![reply("VERSION 1.0.4-mock")],
            "MYCALL" => vec![reply("MYCALL W1AW")],
            "GRIDSQUARE" => vec![reply("GRIDSQUARE EM00")],
            "PROTOCOLMODE" => vec![reply("PROTOCOLMODE ARQ")],
            "MYAUX" => vec![reply("MYAUX W1AW-1,W1AW-2")],
            "ARQBW" => vec![reply("ARQBW 500MAX")],
            "ARQTIMEOUT" => vec![reply("ARQTIMEOUT 90")],
            "LISTEN" | "CWID" | "AUTOBREAK" | "CODEC" => {
                vec![reply(&format!("{} TRUE", token))]
            }
            "DISCONNECT" => vec![reply("DISCONNECT"), reply("NEWSTATE DISC")],
            _ => vec![reply(token)],
        },
    }
}

/// Handle to a running mock TNC
pub struct MockTnc {
    lines: Arc<Mutex<Vec<String>>>,
    data: Arc<Mutex<Vec<u8>>>,
    inject: mpsc::UnboundedSender<Inject>,
}

impl MockTnc {
    /// Control lines received from the host so far
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    /// Raw bytes received on the data port so far
    pub fn data(&self) -> Vec<u8> {
        self.data.lock().unwrap().clone()
    }

    /// Send an unsolicited control line
    pub fn line(&self, line: &str) {
        self.inject.unbounded_send(reply(line)).unwrap();
    }

    /// Send a data frame
    pub fn frame(&self, kind: &'static str, payload: &[u8]) {
        self.inject
            .unbounded_send(Inject::Data(kind, payload.to_vec()))
            .unwrap();
    }

    /// Close both streams, as if the TNC exited
    pub fn hang_up(&self) {
        self.inject.unbounded_send(Inject::HangUp).unwrap();
    }

    /// Wait until the host has sent `line`
    pub async fn wait_for_line(&self, line: &str) {
        for _ in 0..500 {
            if self.lines().iter().any(|l| l == line) {
                return;
            }
            task::sleep(Duration::from_millis(10)).await;
        }
        panic!("host never sent {:?}; got {:?}", line, self.lines());
    }

    /// Wait until the data port has received `want`
    pub async fn wait_for_data(&self, want: &[u8]) {
        for _ in 0..500 {
            if self.data() == want {
                return;
            }
            task::sleep(Duration::from_millis(10)).await;
        }
        panic!("data port got {:?}", self.data());
    }
}

/// Start a mock TNC with a control port and a data port
///
/// Returns the mock and the host's ends of both streams.
pub async fn start<H>(handler: H) -> (MockTnc, TcpStream, TcpStream)
where
    H: FnMut(&str) -> Vec<Inject> + Send + 'static,
{
    let (host_control, tnc_control) = socket_pair().await;
    let (host_data, tnc_data) = socket_pair().await;
    let mock = run(handler, tnc_control, Some(tnc_data));
    (mock, host_control, host_data)
}

/// Start a mock TNC which multiplexes over one stream
///
/// Lines and data frames carry `c:` and `d:` prefixes. No
/// checksums.
pub async fn start_combined<H>(handler: H) -> (MockTnc, TcpStream)
where
    H: FnMut(&str) -> Vec<Inject> + Send + 'static,
{
    let (host, tnc) = socket_pair().await;
    let mock = run(handler, tnc, None);
    (mock, host)
}

async fn socket_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let host = TcpStream::connect(addr).await.unwrap();
    let (tnc, _peer) = listener.accept().await.unwrap();
    (host, tnc)
}

fn run<H>(mut handler: H, control: TcpStream, data: Option<TcpStream>) -> MockTnc
where
    H: FnMut(&str) -> Vec<Inject> + Send + 'static,
{
    let combined = data.is_none();
    let lines = Arc::new(Mutex::new(vec![]));
    let received = Arc::new(Mutex::new(vec![]));
    let (inject_tx, mut inject_rx) = mpsc::unbounded::<Inject>();

    // all writes to the host funnel through one task
    let mut control_out = control.clone();
    let mut data_out = data.clone();
    task::spawn(async move {
        while let Some(msg) = inject_rx.next().await {
            let res = match msg {
                Inject::Line(line) => {
                    let prefix = if combined { "c:" } else { "" };
                    let out = format!("{}{}\r", prefix, line);
                    control_out.write_all(out.as_bytes()).await
                }
                Inject::Data(kind, payload) => {
                    let mut out = vec![];
                    if combined {
                        out.extend_from_slice(b"d:");
                    }
                    let len = (payload.len() + 3) as u16;
                    out.extend_from_slice(&len.to_be_bytes());
                    out.extend_from_slice(kind.as_bytes());
                    out.extend_from_slice(&payload);
                    match data_out.as_mut() {
                        Some(stream) => stream.write_all(&out).await,
                        None => control_out.write_all(&out).await,
                    }
                }
                Inject::HangUp => {
                    let _ = control_out.shutdown(Shutdown::Both);
                    if let Some(stream) = data_out.as_ref() {
                        let _ = stream.shutdown(Shutdown::Both);
                    }
                    break;
                }
            };
            if res.is_err() {
                break;
            }
        }
    });

    // control lines from the host
    let log = lines.clone();
    let replies = inject_tx.clone();
    task::spawn(async move {
        let mut rd = BufReader::new(control);
        let mut buf = vec![];
        loop {
            buf.clear();
            match rd.read_until(b'\r', &mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let text = String::from_utf8_lossy(&buf);
            let text = text.trim_end_matches('\r');
            let line = if combined {
                text.trim_start_matches("c:")
            } else {
                text
            };
            log.lock().unwrap().push(line.to_owned());
            for out in handler(line) {
                if replies.unbounded_send(out).is_err() {
                    return;
                }
            }
        }
    });

    // payload from the host
    if let Some(mut data) = data {
        let sink = received.clone();
        task::spawn(async move {
            let mut buf = [0u8; 512];
            loop {
                match data.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => sink.lock().unwrap().extend_from_slice(&buf[..n]),
                }
            }
        });
    }

    MockTnc {
        lines,
        data: received,
        inject: inject_tx,
    }
}
