//! BFH sequence implementation

use std::io::{self, Read};
use std::path::PathBuf;

use super::policy::BfhConfig;
use crate::blob::{self, BlobSource};
use crate::channel::ControllerChannel;
use crate::error::{ChannelOp, ChannelResultExt, Error, Result};
use crate::msp::{LoaderId, LoaderTable, MspType, NandDescriptor};

/// Grace period for the controller's mode transition after the handoff
pub const BFH_SETTLE_MS: u32 = 1000;

/// Caller choices for one BFH run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BfhRequest {
    /// Read the loader from the stream with exactly this many bytes
    ///
    /// Zero is treated as "no override".
    pub override_size: Option<u64>,
    /// Use this loader image instead of the table entry
    pub loader_path: Option<PathBuf>,
}

impl BfhRequest {
    /// Request that reads the loader from the stream
    pub fn with_override_size(size: u64) -> Self {
        Self {
            override_size: Some(size),
            loader_path: None,
        }
    }

    /// Request that uses an explicit loader image
    pub fn with_loader_path(path: impl Into<PathBuf>) -> Self {
        Self {
            override_size: None,
            loader_path: Some(path.into()),
        }
    }
}

/// What happened to the loader image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferReport {
    /// The controller variant needs no loader
    Skipped,
    /// The loader was handed over
    Sent {
        /// Where the image came from
        source: BlobSource,
        /// Transfer length in bytes
        len: usize,
    },
}

/// Result of a successful BFH run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BfhOutcome {
    /// Reported MSP type
    pub msp_type: MspType,
    /// Loader table index
    pub loader_id: LoaderId,
    /// Loader transfer details
    pub transfer: TransferReport,
    /// NAND descriptor read after the handoff
    pub descriptor: NandDescriptor,
    /// Firmware image path derived from the descriptor
    pub firmware_path: String,
}

/// Callback for progress reporting during a BFH run
pub trait BfhProgress {
    /// Called right before the loader is handed to the controller
    fn transferring(&mut self, source: &BlobSource, len: usize);

    /// Called before the settle delay
    fn settling(&mut self, ms: u32);

    /// Called before the descriptor is read
    fn fetching_descriptor(&mut self);

    /// Called when the run succeeded
    fn complete(&mut self, outcome: &BfhOutcome);

    /// Called when the run failed
    fn failed(&mut self, error: &Error);
}

/// A no-op progress reporter
pub struct NoProgress;

impl BfhProgress for NoProgress {
    fn transferring(&mut self, _source: &BlobSource, _len: usize) {}
    fn settling(&mut self, _ms: u32) {}
    fn fetching_descriptor(&mut self) {}
    fn complete(&mut self, _outcome: &BfhOutcome) {}
    fn failed(&mut self, _error: &Error) {}
}

/// Runs the BFH recovery handoff against one channel
///
/// Stream-sourced loaders are read from `R`, standard input by default.
pub struct BfhSequencer<'a, C: ControllerChannel + ?Sized, R: Read = io::Stdin> {
    channel: &'a mut C,
    table: &'a LoaderTable,
    config: BfhConfig,
    stream: R,
}

impl<'a, C: ControllerChannel + ?Sized> BfhSequencer<'a, C> {
    /// Create a sequencer reading stream loaders from standard input
    pub fn new(channel: &'a mut C, table: &'a LoaderTable) -> Self {
        Self {
            channel,
            table,
            config: BfhConfig::default(),
            stream: io::stdin(),
        }
    }
}

impl<'a, C: ControllerChannel + ?Sized, R: Read> BfhSequencer<'a, C, R> {
    /// Replace the settings
    pub fn with_config(mut self, config: BfhConfig) -> Self {
        self.config = config;
        self
    }

    /// Read stream loaders from `stream` instead
    pub fn with_stream<S: Read>(self, stream: S) -> BfhSequencer<'a, C, S> {
        BfhSequencer {
            channel: self.channel,
            table: self.table,
            config: self.config,
            stream,
        }
    }

    /// Run the sequence
    pub fn run(&mut self, request: &BfhRequest) -> Result<BfhOutcome> {
        self.run_with_progress(request, &mut NoProgress)
    }

    /// Run the sequence, reporting progress
    pub fn run_with_progress<P: BfhProgress + ?Sized>(
        &mut self,
        request: &BfhRequest,
        progress: &mut P,
    ) -> Result<BfhOutcome> {
        let result = self.sequence(request, progress);
        match &result {
            Ok(outcome) => progress.complete(outcome),
            Err(e) => progress.failed(e),
        }
        result
    }

    fn sequence<P: BfhProgress + ?Sized>(
        &mut self,
        request: &BfhRequest,
        progress: &mut P,
    ) -> Result<BfhOutcome> {
        let msp_type = MspType(self.channel.msp_type().op(ChannelOp::GetMspType)?);
        let loader_id = msp_type.validate()?;
        log::debug!("MSP type {} -> loader id {}", msp_type, loader_id.get());

        let bfh_mode = self
            .channel
            .is_bfh_mode()
            .map_err(Error::BfhStatusUnavailable)?;
        log::debug!("Controller reports BFH mode: {}", bfh_mode);
        self.config.entry.check(bfh_mode)?;

        let transfer = if loader_id.skips_transfer() {
            log::info!("MSP type {} needs no BFH loader, skipping transfer", msp_type);
            TransferReport::Skipped
        } else {
            let source = self.select_source(request, loader_id);
            let len = self.transfer(&source, progress)?;

            progress.settling(BFH_SETTLE_MS);
            self.channel.delay_ms(BFH_SETTLE_MS);

            let recheck = self.channel.is_bfh_mode();
            log::debug!("BFH status after handoff: {:?}", recheck);
            if !self.config.recheck.allows_fetch(&recheck) {
                return Err(Error::BfhExitUnconfirmed(recheck));
            }

            TransferReport::Sent { source, len }
        };

        progress.fetching_descriptor();
        let descriptor = NandDescriptor(
            self.channel
                .nand_descriptor()
                .op(ChannelOp::GetNandDescriptor)?,
        );
        let firmware_path = descriptor.firmware_path(self.table, msp_type)?;
        log::debug!("NAND firmware image: {}", firmware_path);

        Ok(BfhOutcome {
            msp_type,
            loader_id,
            transfer,
            descriptor,
            firmware_path,
        })
    }

    /// Pick the loader source for `loader_id`
    ///
    /// A nonzero override size reads from the stream and never consults the
    /// table. Otherwise the explicit loader path wins over the table entry.
    pub fn select_source(&self, request: &BfhRequest, loader_id: LoaderId) -> BlobSource {
        match request.override_size.filter(|&size| size != 0) {
            Some(size) => {
                log::info!("Override BFH case");
                BlobSource::Stream { size }
            }
            None => {
                let path = request
                    .loader_path
                    .clone()
                    .unwrap_or_else(|| self.table.resolve(loader_id).to_path_buf());
                log::info!("Non-override BFH case. BFH loader path: {}", path.display());
                BlobSource::Path(path)
            }
        }
    }

    /// Load the loader image and hand it to the controller
    ///
    /// The image buffer is dropped before the channel status is inspected,
    /// so it is released on both paths.
    fn transfer<P: BfhProgress + ?Sized>(
        &mut self,
        source: &BlobSource,
        progress: &mut P,
    ) -> Result<usize> {
        let blob = blob::load(source, &mut self.stream, self.config.max_stream_size)?;
        let len = blob.len();

        progress.transferring(source, len);
        let status = self.channel.perform_bfh(blob.as_bytes());
        drop(blob);

        status.op(ChannelOp::PerformBfh)?;
        log::info!("Handed {} byte BFH loader to controller", len);
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bfh::{EntryPolarity, RecheckPolicy};
    use crate::blob::BlobError;
    use crate::channel::{ChannelResult, ChannelStatus};
    use crate::msp::{LoaderEntry, LOADER_TABLE_LEN};
    use std::collections::VecDeque;
    use std::io::{Cursor, Write};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        MspType,
        IsBfhMode,
        PerformBfh(usize),
        Delay(u32),
        NandDescriptor,
    }

    struct ScriptedChannel {
        msp: ChannelResult<u32>,
        bfh: VecDeque<ChannelResult<bool>>,
        perform: ChannelResult<()>,
        descriptor: ChannelResult<u64>,
        calls: Vec<Call>,
    }

    impl ScriptedChannel {
        fn new(msp: u32, bfh: &[ChannelResult<bool>]) -> Self {
            Self {
                msp: Ok(msp),
                bfh: bfh.iter().copied().collect(),
                perform: Ok(()),
                descriptor: Ok(0x1122_3344_5566_7788),
                calls: Vec::new(),
            }
        }

        fn transfers(&self) -> Vec<usize> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    Call::PerformBfh(len) => Some(*len),
                    _ => None,
                })
                .collect()
        }
    }

    impl ControllerChannel for ScriptedChannel {
        fn msp_type(&mut self) -> ChannelResult<u32> {
            self.calls.push(Call::MspType);
            self.msp
        }

        fn is_bfh_mode(&mut self) -> ChannelResult<bool> {
            self.calls.push(Call::IsBfhMode);
            self.bfh.pop_front().unwrap_or(Err(ChannelStatus::ERROR))
        }

        fn perform_bfh(&mut self, blob: &[u8]) -> ChannelResult<()> {
            self.calls.push(Call::PerformBfh(blob.len()));
            self.perform
        }

        fn nand_descriptor(&mut self) -> ChannelResult<u64> {
            self.calls.push(Call::NandDescriptor);
            self.descriptor
        }

        fn delay_ms(&mut self, ms: u32) {
            self.calls.push(Call::Delay(ms));
        }
    }

    /// Loader table whose entries all point at one temporary file
    fn temp_table(contents: &[u8]) -> (tempfile::NamedTempFile, LoaderTable) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file.flush().unwrap();
        let path = file.path().to_path_buf();
        let dirs = ["d0", "d1", "d2", "d3", "d4"];
        let entries: [LoaderEntry; LOADER_TABLE_LEN] =
            dirs.map(|dir| LoaderEntry::new(dir, path.clone()));
        (file, LoaderTable::from_entries(entries))
    }

    const FAILED: ChannelResult<bool> = Err(ChannelStatus::ERROR);

    #[test]
    fn test_unknown_msp_fails_before_transfer() {
        let table = LoaderTable::builtin();
        for raw in [4u32, 5, 10, 0xFFFF_FFFE] {
            let mut channel = ScriptedChannel::new(raw, &[Ok(true)]);
            let err = BfhSequencer::new(&mut channel, &table)
                .run(&BfhRequest::default())
                .unwrap_err();
            assert!(matches!(err, Error::UnknownMspType(r) if r == raw));
            assert_eq!(channel.calls, vec![Call::MspType]);
        }
    }

    #[test]
    fn test_named_loader_resolved_for_transfer_variants() {
        let table = LoaderTable::builtin();
        for id in [0u32, 1, 2, 4] {
            let mut channel = ScriptedChannel::new(0, &[]);
            let seq = BfhSequencer::new(&mut channel, &table);
            let loader_id = LoaderId::new(id).unwrap();
            match seq.select_source(&BfhRequest::default(), loader_id) {
                BlobSource::Path(path) => {
                    assert!(!path.as_os_str().is_empty());
                    assert_eq!(path, table.resolve(loader_id));
                }
                other => panic!("unexpected source {:?}", other),
            }
        }
    }

    #[test]
    fn test_scenario_a_named_loader() {
        let (_file, table) = temp_table(&[0xA5; 300]);
        let mut channel = ScriptedChannel::new(0, &[Ok(true), FAILED]);

        let outcome = BfhSequencer::new(&mut channel, &table)
            .run(&BfhRequest::default())
            .unwrap();

        assert_eq!(outcome.descriptor.to_string(), "1122334455667788");
        assert_eq!(outcome.firmware_path, "d1/1122334455667788.pak");
        assert!(matches!(outcome.transfer, TransferReport::Sent { len: 300, .. }));
        assert_eq!(
            channel.calls,
            vec![
                Call::MspType,
                Call::IsBfhMode,
                Call::PerformBfh(300),
                Call::Delay(BFH_SETTLE_MS),
                Call::IsBfhMode,
                Call::NandDescriptor,
            ]
        );
    }

    #[test]
    fn test_loader_id_three_skips_transfer() {
        let table = LoaderTable::builtin();
        let mut channel = ScriptedChannel::new(2, &[Ok(true)]);

        let outcome = BfhSequencer::new(&mut channel, &table)
            .run(&BfhRequest::with_override_size(512))
            .unwrap();

        assert_eq!(outcome.transfer, TransferReport::Skipped);
        assert_eq!(
            channel.calls,
            vec![Call::MspType, Call::IsBfhMode, Call::NandDescriptor]
        );
    }

    #[test]
    fn test_scenario_d_override_size() {
        // Table paths do not exist; any attempt to use them would fail
        let table = LoaderTable::builtin();
        let mut channel = ScriptedChannel::new(1, &[Ok(true), FAILED]);
        let mut stdin = Cursor::new(vec![0x5Au8; 4096]);

        let outcome = BfhSequencer::new(&mut channel, &table)
            .with_stream(&mut stdin)
            .run(&BfhRequest::with_override_size(512))
            .unwrap();

        assert_eq!(channel.transfers(), vec![512]);
        assert_eq!(
            outcome.transfer,
            TransferReport::Sent {
                source: BlobSource::Stream { size: 512 },
                len: 512
            }
        );
        assert_eq!(stdin.position(), 512);
    }

    #[test]
    fn test_override_short_stream_fails_without_transfer() {
        let table = LoaderTable::builtin();
        let mut channel = ScriptedChannel::new(1, &[Ok(true)]);

        let err = BfhSequencer::new(&mut channel, &table)
            .with_stream(Cursor::new(vec![0u8; 100]))
            .run(&BfhRequest::with_override_size(512))
            .unwrap_err();

        assert!(matches!(err, Error::Blob(BlobError::ShortRead { .. })));
        assert!(channel.transfers().is_empty());
    }

    #[test]
    fn test_explicit_loader_path() {
        let (file, _) = temp_table(&[1, 2, 3, 4]);
        let table = LoaderTable::builtin();
        let mut channel = ScriptedChannel::new(3, &[Ok(true), FAILED]);

        let outcome = BfhSequencer::new(&mut channel, &table)
            .run(&BfhRequest::with_loader_path(file.path()))
            .unwrap();

        assert_eq!(channel.transfers(), vec![4]);
        assert_eq!(
            outcome.transfer,
            TransferReport::Sent {
                source: BlobSource::Path(file.path().to_path_buf()),
                len: 4
            }
        );
    }

    #[test]
    fn test_missing_loader_file() {
        let table = LoaderTable::builtin();
        let mut channel = ScriptedChannel::new(0, &[Ok(true)]);

        let err = BfhSequencer::new(&mut channel, &table)
            .run(&BfhRequest::with_loader_path("/nonexistent"))
            .unwrap_err();

        assert!(err.to_string().starts_with("Error opening file"));
        assert!(channel.transfers().is_empty());
    }

    #[test]
    fn test_status_query_failure() {
        let table = LoaderTable::builtin();
        let mut channel = ScriptedChannel::new(0, &[FAILED]);

        let err = BfhSequencer::new(&mut channel, &table)
            .run(&BfhRequest::default())
            .unwrap_err();

        assert!(matches!(err, Error::BfhStatusUnavailable(_)));
        assert_eq!(channel.calls, vec![Call::MspType, Call::IsBfhMode]);
    }

    #[test]
    fn test_not_in_bfh_mode() {
        let table = LoaderTable::builtin();
        let mut channel = ScriptedChannel::new(0, &[Ok(false)]);

        let err = BfhSequencer::new(&mut channel, &table)
            .run(&BfhRequest::default())
            .unwrap_err();

        assert!(matches!(err, Error::NotInBfhMode));
        assert!(channel.transfers().is_empty());
    }

    #[test]
    fn test_inverted_entry_polarity() {
        let table = LoaderTable::builtin();
        let mut channel = ScriptedChannel::new(2, &[Ok(false)]);
        let config = BfhConfig {
            entry: EntryPolarity::RequireNormalMode,
            ..BfhConfig::default()
        };

        let outcome = BfhSequencer::new(&mut channel, &table)
            .with_config(config)
            .run(&BfhRequest::default())
            .unwrap();
        assert_eq!(outcome.transfer, TransferReport::Skipped);
    }

    #[test]
    fn test_perform_failure_skips_settle() {
        let (_file, table) = temp_table(&[0; 16]);
        let mut channel = ScriptedChannel::new(0, &[Ok(true)]);
        channel.perform = Err(ChannelStatus::NOT_READY);

        let err = BfhSequencer::new(&mut channel, &table)
            .run(&BfhRequest::default())
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Channel { op: ChannelOp::PerformBfh, status } if status == ChannelStatus::NOT_READY
        ));
        assert!(!channel.calls.contains(&Call::Delay(BFH_SETTLE_MS)));
    }

    #[test]
    fn test_recheck_success_blocks_fetch_by_default() {
        let (_file, table) = temp_table(&[0; 16]);
        let mut channel = ScriptedChannel::new(0, &[Ok(true), Ok(true)]);

        let err = BfhSequencer::new(&mut channel, &table)
            .run(&BfhRequest::default())
            .unwrap_err();

        assert!(matches!(err, Error::BfhExitUnconfirmed(Ok(true))));
        assert!(!channel.calls.contains(&Call::NandDescriptor));
    }

    #[test]
    fn test_recheck_mode_exit_policy() {
        let (_file, table) = temp_table(&[0; 16]);
        let mut channel = ScriptedChannel::new(0, &[Ok(true), Ok(false)]);
        let config = BfhConfig {
            recheck: RecheckPolicy::ProceedOnModeExit,
            ..BfhConfig::default()
        };

        let outcome = BfhSequencer::new(&mut channel, &table)
            .with_config(config)
            .run(&BfhRequest::default())
            .unwrap();
        assert_eq!(outcome.descriptor, NandDescriptor(0x1122_3344_5566_7788));
    }

    #[test]
    fn test_descriptor_failure() {
        let table = LoaderTable::builtin();
        let mut channel = ScriptedChannel::new(2, &[Ok(true)]);
        channel.descriptor = Err(ChannelStatus::ERROR);

        let err = BfhSequencer::new(&mut channel, &table)
            .run(&BfhRequest::default())
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Channel { op: ChannelOp::GetNandDescriptor, .. }
        ));
    }

    #[test]
    fn test_progress_reports_failure() {
        struct Recorder {
            failed: bool,
            completed: bool,
        }
        impl BfhProgress for Recorder {
            fn transferring(&mut self, _source: &BlobSource, _len: usize) {}
            fn settling(&mut self, _ms: u32) {}
            fn fetching_descriptor(&mut self) {}
            fn complete(&mut self, _outcome: &BfhOutcome) {
                self.completed = true;
            }
            fn failed(&mut self, _error: &Error) {
                self.failed = true;
            }
        }

        let table = LoaderTable::builtin();
        let mut channel = ScriptedChannel::new(10, &[]);
        let mut recorder = Recorder {
            failed: false,
            completed: false,
        };
        let _ = BfhSequencer::new(&mut channel, &table)
            .run_with_progress(&BfhRequest::default(), &mut recorder);
        assert!(recorder.failed);
        assert!(!recorder.completed);
    }
}
