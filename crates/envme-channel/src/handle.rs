//! ChannelHandle - owned controller connection

use envme_core::error::{ChannelOp, ChannelResultExt, Result};
use envme_core::ControllerChannel;

/// Owned connection to a controller
///
/// The handle is created once at startup and handed by `&mut` to whatever
/// needs the controller. The connection is closed exactly once: explicitly
/// through [`close`](Self::close), or when the handle is dropped.
pub struct ChannelHandle {
    name: String,
    channel: Box<dyn ControllerChannel>,
    closed: bool,
}

impl ChannelHandle {
    /// Wrap an opened backend
    pub fn new(name: impl Into<String>, channel: Box<dyn ControllerChannel>) -> Self {
        Self {
            name: name.into(),
            channel,
            closed: false,
        }
    }

    /// Channel name as given to the registry
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Borrow the underlying channel
    pub fn as_channel_mut(&mut self) -> &mut dyn ControllerChannel {
        self.channel.as_mut()
    }

    /// Close the connection, reporting the status
    pub fn close(mut self) -> Result<()> {
        self.close_inner().op(ChannelOp::Close)
    }

    fn close_inner(&mut self) -> envme_core::ChannelResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        log::debug!("Closing channel {}", self.name);
        self.channel.close()
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        if let Err(status) = self.close_inner() {
            log::warn!("Failed to close channel {}: status={}", self.name, status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use envme_core::{ChannelResult, ChannelStatus};
    use std::cell::Cell;
    use std::rc::Rc;

    struct CountingChannel {
        closes: Rc<Cell<u32>>,
        close_status: ChannelResult<()>,
    }

    impl ControllerChannel for CountingChannel {
        fn msp_type(&mut self) -> ChannelResult<u32> {
            Ok(1)
        }
        fn is_bfh_mode(&mut self) -> ChannelResult<bool> {
            Ok(true)
        }
        fn perform_bfh(&mut self, _blob: &[u8]) -> ChannelResult<()> {
            Ok(())
        }
        fn nand_descriptor(&mut self) -> ChannelResult<u64> {
            Ok(0)
        }
        fn delay_ms(&mut self, _ms: u32) {}
        fn close(&mut self) -> ChannelResult<()> {
            self.closes.set(self.closes.get() + 1);
            self.close_status
        }
    }

    fn handle(close_status: ChannelResult<()>) -> (ChannelHandle, Rc<Cell<u32>>) {
        let closes = Rc::new(Cell::new(0));
        let channel = CountingChannel {
            closes: closes.clone(),
            close_status,
        };
        (ChannelHandle::new("counting", Box::new(channel)), closes)
    }

    #[test]
    fn test_drop_closes_once() {
        let (mut handle, closes) = handle(Ok(()));
        assert_eq!(handle.as_channel_mut().msp_type(), Ok(1));
        drop(handle);
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn test_explicit_close_not_repeated_on_drop() {
        let (handle, closes) = handle(Ok(()));
        handle.close().unwrap();
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn test_close_failure_reported() {
        let (handle, closes) = handle(Err(ChannelStatus::NOT_OPEN));
        let err = handle.close().unwrap_err();
        assert_eq!(err.to_string(), "Close failed. status=0xe00002cd");
        assert_eq!(closes.get(), 1);
    }
}
