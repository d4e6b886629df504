//! Interface to the ARDOP modem
//!
//! This module contains:
//!
//! * [ArdopTnc](struct.ArdopTnc.html): The main interface
//!   to ARDOP
//! * [TncConfig](struct.TncConfig.html): Driver settings
//! * [Notice](enum.Notice.html): Everything the TNC reports,
//!   as published to [`events()`](struct.ArdopTnc.html#method.events)
//! * [TncError](enum.TncError.html): Errors which occur
//!   with the *local* ARDOP TNC, such as a broken TCP
//!   connection
//! * [TncResult](type.TncResult.html): The `Result` type
//!   for TNC operations.
//!
//! # Example
//!
//! ```no_run
//! use std::net::SocketAddr;
//! use futures::prelude::*;
//!
//! use ardop_tnc::tnc::*;
//!
//! #[async_std::main]
//! async fn main() {
//!    let addr: SocketAddr = "127.0.0.1:8515".parse().unwrap();
//!    let tnc = ArdopTnc::connect_tcp(&addr, "MYC4LL", Some("EM00"), TncConfig::default())
//!        .await
//!        .unwrap();
//!    match tnc.version().await {
//!         Ok(version) => println!("Connected to TNC version {}", version),
//!         Err(e) => println!("Can't query TNC version: {}", e)
//!    }
//!    let mut stream = tnc.connect("W1AW", 5).await.unwrap();
//!    stream.write_all(b"Hello, world!\n").await.unwrap();
//!    stream.close().await.unwrap();
//!    tnc.close().await;
//! }
//! ```
//!
//! # Error Handling
//!
//! Most operations on the [ArdopTnc](struct.ArdopTnc.html) return
//! a [TncResult](type.TncResult.html). If the TNC rejects your command
//! with a `FAULT`, then the `Err()` half of the result carries the
//! TNC's message verbatim, as `TncError::CommandFailed`.
//!
//! Once the interface is closed, or the TNC hangs up, every operation
//! fails with `TncError::Closed`. Operations which were waiting on the
//! TNC at that time fail the same way.
//!
//! Problems decoding the TNC's output are not errors to the caller.
//! They are logged and counted (see
//! [`decode_faults()`](struct.ArdopTnc.html#method.decode_faults)),
//! and the TNC is asked to repeat itself.

mod ardoptnc;
mod config;
mod error;
mod notice;
mod ptt;

pub use ardoptnc::ArdopTnc;
pub use config::{
    TncConfig, DEFAULT_ARQ_TIMEOUT, DEFAULT_INBOUND_CAPACITY, DEFAULT_INBOUND_GRACE,
    DEFAULT_SEND_HIGH_WATER,
};
pub use error::{TncError, TncResult};
pub use notice::{Notice, SessionOffer};
pub use ptt::PttController;

pub use crate::tncio::broadcaster::Subscription;
pub use crate::tncio::dispatcher::HeardTable;
