//! envme-core - Core library for embedded NVMe controller recovery
//!
//! This crate contains everything `envmectl` needs to talk to an embedded
//! NVMe controller that is reachable through a vendor service connection,
//! without knowing anything about how that connection is implemented.
//!
//! # Overview
//!
//! - [`channel`] defines the [`ControllerChannel`] trait that every backend
//!   implements, together with the opaque [`ChannelStatus`] codes it returns
//! - [`msp`] maps the controller's MSP type to a BFH loader image and a
//!   firmware directory
//! - [`blob`] loads loader/firmware images from a file or from a stream with
//!   exact-length semantics
//! - [`bfh`] drives the boot-from-host recovery handoff
//! - [`identify`] and [`power`] model the passthrough commands
//! - [`config`] reads the optional TOML configuration file
//!
//! # Example
//!
//! ```ignore
//! use envme_core::bfh::{BfhRequest, BfhSequencer};
//! use envme_core::msp::LoaderTable;
//!
//! fn recover<C: envme_core::ControllerChannel>(channel: &mut C) -> envme_core::Result<()> {
//!     let table = LoaderTable::builtin();
//!     let outcome = BfhSequencer::new(channel, &table).run(&BfhRequest::default())?;
//!     println!("{}", outcome.descriptor);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod bfh;
pub mod blob;
pub mod channel;
pub mod config;
pub mod error;
pub mod identify;
pub mod msp;
pub mod power;

pub use channel::{ChannelResult, ChannelStatus, ControllerChannel};
pub use error::{ChannelOp, Error, Result};
