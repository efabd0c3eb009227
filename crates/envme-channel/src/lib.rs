//! Channel selection and connection lifetime
//!
//! The CLI never constructs a backend directly. It passes a channel string
//! such as `dummy:msp=2,bfh=on` to [`open_channel`] and gets back a
//! [`ChannelHandle`] that owns the connection for the rest of the run.
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │             CLI (bin/envmectl)              │
//! │  - Only sees ChannelHandle                  │
//! └─────────────────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌─────────────────────────────────────────────┐
//! │          envme-channel (this crate)         │
//! │  - Parses "name:key=value,..."              │
//! │  - Opens the backend, closes it on drop     │
//! └─────────────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          ▼                         ▼
//! ┌──────────────────┐     ┌──────────────────┐
//! │   envme-core     │     │ Backend crates   │
//! │ ControllerChannel│     │  - envme-dummy   │
//! └──────────────────┘     └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use envme_channel::open_channel;
//!
//! let mut handle = open_channel("dummy:msp=0")?;
//! let msp = handle.as_channel_mut().msp_type()?;
//! ```

mod handle;
mod registry;

pub use handle::ChannelHandle;
pub use registry::{
    available_channels, channel_names_short, open_channel, parse_channel_params, ChannelInfo,
    ChannelOpenError, ChannelParams,
};

// Re-export core types that the CLI needs
pub use envme_core::ControllerChannel;
