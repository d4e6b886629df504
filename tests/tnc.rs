//! Integration tests against a scripted mock TNC

mod common;

use std::time::Duration;

use async_std::task;
use futures::io::{AsyncReadExt, AsyncWriteExt};
use futures::stream::StreamExt;

use ardop_tnc::arq::CallDirection;
use ardop_tnc::tnc::{ArdopTnc, Notice, TncConfig, TncError};
use ardop_tnc::{Bandwidth, ProtocolMode, State};

use common::{echo, reply, Inject, MockTnc};

const INIT_LINES: &[&str] = &[
    "INITIALIZE",
    "STATE",
    "PROTOCOLMODE ARQ",
    "ARQTIMEOUT 90",
    "LISTEN FALSE",
    "MYCALL W1AW",
    "GRIDSQUARE EM00",
];

async fn open_with<H>(handler: H, config: TncConfig) -> (MockTnc, ArdopTnc)
where
    H: FnMut(&str) -> Vec<Inject> + Send + 'static,
{
    let (mock, control, data) = common::start(handler).await;
    let tnc = ArdopTnc::open(control, Some(data), "W1AW", Some("EM00"), config)
        .await
        .unwrap();
    (mock, tnc)
}

async fn open() -> (MockTnc, ArdopTnc) {
    open_with(echo, TncConfig::default()).await
}

// answers ARQCALL with a completed connection
fn connecting(line: &str) -> Vec<Inject> {
    if line.starts_with("ARQCALL ") {
        vec![
            reply(line),
            reply("NEWSTATE ISS"),
            reply("CONNECTED W9ABC 500 EM00"),
        ]
    } else if line == "DISCONNECT" {
        vec![
            reply("DISCONNECT"),
            reply("DISCONNECTED"),
            reply("NEWSTATE DISC"),
        ]
    } else {
        echo(line)
    }
}

#[test]
fn test_open_initializes() {
    task::block_on(async {
        let (mock, tnc) = open().await;
        assert_eq!(INIT_LINES.to_vec(), mock.lines());
        assert!(tnc.is_idle());
        assert!(!tnc.is_closed());

        // the startup STATE reply is reflected without a NEWSTATE
        tnc.heard().await.unwrap();
        assert_eq!(State::DISC, tnc.state());
    })
}

#[test]
fn test_open_starts_codec() {
    task::block_on(async {
        let handler = |line: &str| match line {
            "STATE" => vec![reply("STATE OFFLINE")],
            _ => echo(line),
        };
        let (mock, _tnc) = open_with(handler, TncConfig::default()).await;
        let lines = mock.lines();
        assert_eq!("STATE", lines[1]);
        assert_eq!("CODEC TRUE", lines[2]);
        assert_eq!("PROTOCOLMODE ARQ", lines[3]);
    })
}

#[test]
fn test_open_port_busy() {
    task::block_on(async {
        let (_mock, control, data) = common::start(|_line: &str| vec![Inject::HangUp]).await;
        match ArdopTnc::open(control, Some(data), "W1AW", None, TncConfig::default()).await {
            Err(TncError::ControlPortBusy) => assert!(true),
            other => panic!("expected ControlPortBusy, got {:?}", other.map(|_| ())),
        }
    })
}

#[test]
fn test_get_mycall_ignores_later_fault() {
    task::block_on(async {
        let handler = |line: &str| match line {
            "MYCALL" => vec![
                reply("NEWSTATE DISCONNECTED"),
                reply("MYCALL N0CALL"),
                reply("FAULT bad"),
            ],
            _ => echo(line),
        };
        let (_mock, tnc) = open_with(handler, TncConfig::default()).await;
        assert_eq!("N0CALL", tnc.mycall().await.unwrap());
    })
}

#[test]
fn test_fault() {
    task::block_on(async {
        let handler = |line: &str| match line {
            "VERSION" => vec![reply("FAULT Not from state FECSend")],
            _ => echo(line),
        };
        let (_mock, tnc) = open_with(handler, TncConfig::default()).await;
        match tnc.version().await {
            Err(TncError::CommandFailed(msg)) => assert_eq!("Not from state FECSend", msg),
            other => panic!("expected a fault, got {:?}", other),
        }
    })
}

#[test]
fn test_getters_and_setters() {
    task::block_on(async {
        let (mock, tnc) = open().await;
        assert_eq!("1.0.4-mock", tnc.version().await.unwrap());
        assert_eq!(State::DISC, tnc.query_state().await.unwrap());
        assert_eq!(ProtocolMode::ARQ, tnc.protocolmode().await.unwrap());
        assert_eq!("EM00", tnc.gridsquare().await.unwrap());
        assert_eq!(
            vec!["W1AW-1".to_owned(), "W1AW-2".to_owned()],
            tnc.myaux().await.unwrap()
        );
        assert_eq!(Bandwidth::max(500), tnc.arqbw().await.unwrap());
        assert_eq!(Duration::from_secs(90), tnc.arqtimeout().await.unwrap());
        assert!(tnc.cwid().await.unwrap());

        tnc.set_arqbw(Bandwidth::forced(2000)).await.unwrap();
        tnc.set_cwid(false).await.unwrap();
        tnc.set_myaux(vec!["W1AW-S".to_owned()]).await.unwrap();
        tnc.send_id().await.unwrap();

        let lines = mock.lines();
        let tail = &lines[lines.len() - 4..];
        assert_eq!(
            &["ARQBW 2000FORCED", "CWID FALSE", "MYAUX W1AW-S", "SENDID"],
            tail
        );
    })
}

#[test]
fn test_concurrent_requests() {
    task::block_on(async {
        let (_mock, tnc) = open().await;
        let (a, b, c) = futures::join!(tnc.version(), tnc.mycall(), tnc.version());
        assert_eq!("1.0.4-mock", a.unwrap());
        assert_eq!("W1AW", b.unwrap());
        assert_eq!("1.0.4-mock", c.unwrap());
    })
}

#[test]
fn test_connect_when_busy_sends_nothing() {
    task::block_on(async {
        let (mock, tnc) = open().await;
        let mut states = tnc.state_changes();
        mock.line("NEWSTATE IRS");
        assert_eq!(Some(State::IRS), states.next().await);

        match tnc.connect("W9ABC", 3).await {
            Err(TncError::ConnectInProgress) => assert!(true),
            other => panic!("expected ConnectInProgress, got {:?}", other.map(|_| ())),
        }

        // the next line the TNC sees is the version query
        let before = mock.lines().len();
        tnc.version().await.unwrap();
        assert_eq!(vec!["VERSION".to_owned()], mock.lines()[before..].to_vec());
    })
}

#[test]
fn test_disconnect_when_idle_sends_nothing() {
    task::block_on(async {
        let (mock, tnc) = open().await;
        tnc.disconnect().await.unwrap();
        tnc.version().await.unwrap();
        let mut expect: Vec<String> = INIT_LINES.iter().map(|s| s.to_string()).collect();
        expect.push("VERSION".to_owned());
        assert_eq!(expect, mock.lines());
    })
}

#[test]
fn test_connect_timeout() {
    task::block_on(async {
        let handler = |line: &str| {
            if line.starts_with("ARQCALL ") {
                vec![reply(line), reply("NEWSTATE ISS"), reply("NEWSTATE DISC")]
            } else {
                echo(line)
            }
        };
        let (_mock, tnc) = open_with(handler, TncConfig::default()).await;
        match tnc.connect("W9ABC", 3).await {
            Err(TncError::ConnectTimeout) => assert!(true),
            other => panic!("expected ConnectTimeout, got {:?}", other.map(|_| ())),
        }
        assert!(tnc.is_idle());
    })
}

#[test]
fn test_connect_transfer_disconnect() {
    task::block_on(async {
        let (mock, tnc) = open_with(connecting, TncConfig::default()).await;
        let mut stream = tnc.connect("W9ABC", 3).await.unwrap();
        assert_eq!("W9ABC", stream.info().peer_call());
        assert_eq!(Some("EM00"), stream.info().peer_grid());
        assert_eq!(500, stream.info().bandwidth());
        assert_eq!(
            &CallDirection::Outgoing("W1AW".to_owned()),
            stream.info().direction()
        );
        assert!(mock.lines().contains(&"ARQCALL W9ABC 3".to_owned()));
        assert!(tnc.is_connected());

        // inbound
        mock.frame("ARQ", b"HELLO");
        let mut buf = [0u8; 5];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(b"HELLO", &buf);
        assert_eq!(5, stream.bytes_received());

        // outbound
        stream.write_all(b"73").await.unwrap();
        mock.wait_for_data(b"\x00\x0273").await;
        assert_eq!(2, stream.bytes_transmitted());

        tnc.disconnect().await.unwrap();
        assert!(tnc.is_idle());
        assert!(!tnc.is_connected());
        assert!(!stream.is_open());
        let mut rest = vec![];
        stream.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    })
}

#[test]
fn test_stream_close_disconnects() {
    task::block_on(async {
        let (mock, tnc) = open_with(connecting, TncConfig::default()).await;
        let mut stream = tnc.connect("W9ABC", 3).await.unwrap();
        stream.close().await.unwrap();
        assert!(!stream.is_open());
        mock.wait_for_line("DISCONNECT").await;
        assert_eq!(State::DISC, tnc.state());
    })
}

#[test]
fn test_incoming_connection() {
    task::block_on(async {
        let handler = |line: &str| match line {
            "LISTEN TRUE" => vec![
                reply("LISTEN now TRUE"),
                reply("TARGET W1AW"),
                reply("NEWSTATE IRS"),
                reply("CONNECTED W9ABC 2000"),
            ],
            _ => echo(line),
        };
        let (mock, tnc) = open_with(handler, TncConfig::default()).await;
        let stream = tnc.listen().await.unwrap();
        assert!(stream.info().is_incoming());
        assert_eq!("W1AW", stream.info().local_call());
        assert_eq!(2000, stream.info().bandwidth());

        let lines = mock.lines();
        assert_eq!("LISTEN TRUE", lines[lines.len() - 2]);
        assert_eq!("LISTEN FALSE", lines[lines.len() - 1]);
    })
}

#[test]
fn test_inbound_overflow_disconnects() {
    task::block_on(async {
        let config = TncConfig::default()
            .with_inbound_capacity(1)
            .with_inbound_grace(Duration::from_millis(200));
        let (mock, tnc) = open_with(connecting, config).await;
        let stream = tnc.connect("W9ABC", 3).await.unwrap();
        let mut events = tnc.events();

        // nobody reads
        for _ in 0..6 {
            mock.frame("ARQ", b"0123456789");
        }

        let mut stalled = false;
        loop {
            match events.next().await {
                Some(Notice::InboundStalled) => stalled = true,
                Some(Notice::Response(ardop_tnc::Response::NewState(State::DISC))) => break,
                Some(_) => continue,
                None => panic!("events ended"),
            }
        }
        assert!(stalled);
        assert!(mock.lines().contains(&"DISCONNECT".to_owned()));
        assert_eq!(State::DISC, tnc.state());
        assert!(!stream.is_open());
    })
}

#[test]
fn test_heard_table() {
    task::block_on(async {
        let (mock, tnc) = open().await;
        mock.frame("IDF", b"ID:N0CALL:");
        mock.frame("IDF", b"ID:N1CALL [EM00]:");
        task::sleep(Duration::from_millis(50)).await;
        mock.frame("IDF", b"ID:N0CALL:");

        for _ in 0..100 {
            let heard = tnc.heard().await.unwrap();
            if heard.len() == 2 && heard["N0CALL"] > heard["N1CALL"] {
                return;
            }
            task::sleep(Duration::from_millis(10)).await;
        }
        panic!("heard table never settled: {:?}", tnc.heard().await);
    })
}

#[test]
fn test_ptt() {
    task::block_on(async {
        let (mock, tnc) = open().await;
        let (tx, mut rx) = futures::channel::mpsc::unbounded();
        let ptt = move |on: bool| -> std::io::Result<()> {
            let _ = tx.unbounded_send(on);
            Ok(())
        };
        tnc.set_ptt(Some(Box::new(ptt))).unwrap();
        mock.line("PTT TRUE");
        mock.line("PTT FALSE");
        assert_eq!(Some(true), rx.next().await);
        assert_eq!(Some(false), rx.next().await);
    })
}

#[test]
fn test_beacon() {
    task::block_on(async {
        let (mock, tnc) = open().await;
        tnc.beacon_every(Duration::from_millis(50)).await.unwrap();
        task::sleep(Duration::from_millis(180)).await;
        tnc.close().await;
        let ids = mock.lines().iter().filter(|l| *l == "SENDID").count();
        assert!(ids >= 2, "only {} IDs sent", ids);
    })
}

#[test]
fn test_state_subscription() {
    task::block_on(async {
        let (mock, tnc) = open().await;
        let mut states = tnc.state_changes();
        mock.line("NEWSTATE IRS");
        mock.line("BUSY TRUE");
        mock.line("NEWSTATE DISC");
        assert_eq!(Some(State::IRS), states.next().await);
        assert_eq!(Some(State::DISC), states.next().await);

        tnc.close().await;
        assert_eq!(None, states.next().await);
    })
}

#[test]
fn test_close_is_idempotent() {
    task::block_on(async {
        let (mock, tnc) = open().await;
        tnc.close().await;
        tnc.close().await;
        assert!(tnc.is_closed());

        match tnc.version().await {
            Err(TncError::Closed) => assert!(true),
            other => panic!("expected Closed, got {:?}", other),
        }
        match tnc.connect("W9ABC", 3).await {
            Err(TncError::Closed) => assert!(true),
            other => panic!("expected Closed, got {:?}", other.map(|_| ())),
        }

        let lines = mock.lines();
        assert_eq!("LISTEN FALSE", lines[lines.len() - 1]);
        assert!(!lines.contains(&"DISCONNECT".to_owned()));
    })
}

#[test]
fn test_tnc_hangup_closes() {
    task::block_on(async {
        let (mock, tnc) = open().await;
        let mut events = tnc.events();
        mock.hang_up();
        while events.next().await.is_some() {}
        match tnc.version().await {
            Err(TncError::Closed) => assert!(true),
            other => panic!("expected Closed, got {:?}", other),
        }
    })
}

#[test]
fn test_single_stream() {
    task::block_on(async {
        let (mock, stream) = common::start_combined(connecting).await;
        let tnc = ArdopTnc::open(stream, None, "W1AW", Some("EM00"), TncConfig::default())
            .await
            .unwrap();
        assert_eq!(INIT_LINES.to_vec(), mock.lines());

        let mut arq = tnc.connect("W9ABC", 3).await.unwrap();
        mock.frame("ARQ", b"HELLO");
        let mut buf = [0u8; 5];
        arq.read_exact(&mut buf).await.unwrap();
        assert_eq!(b"HELLO", &buf);

        tnc.close().await;
    })
}
