//! Piece hashing engine
//!
//! Reads every file of a [`PieceLayout`] concurrently, bounded by a
//! [`Limiter`], accumulates the bytes into per-piece buffers and emits one
//! SHA-1 digest per piece. Digests arrive in completion order; wrap the
//! stream in an [`OrderedRelay`](crate::hash::OrderedRelay) when index
//! order matters.
//!
//! A single driver task owns the limiter, the reader tasks and every
//! public event. Readers only talk to the driver through a bounded channel
//! and wait on the shared [`EngineState`] between reads, which is how
//! pause and stop reach them.

use crate::error::{Result, TorrentError};
use crate::hash::files::{FileEntry, FileSource};
use crate::hash::layout::{map_pieces, FileTask, PieceLayout};
use crate::hash::piece::PieceTable;
use crate::hash::queue::{Capacity, Limiter, Ticket, ADMISSION_TICK};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace, warn};

/// Default piece length, 256 KiB
pub const DEFAULT_PIECE_LENGTH: u64 = 1 << 18;

/// Default cap on files opened at once
pub const MAX_FILES_OPENED: usize = 250;

/// Default read size per file
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

const EVENT_CHANNEL_SIZE: usize = 256;

/// Lifecycle of a [`Hasher`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Initializing,
    Ready,
    Hashing,
    Paused,
    Stopped,
    Finished,
}

impl EngineState {
    /// No further transitions are possible
    pub fn is_terminal(self) -> bool {
        matches!(self, EngineState::Stopped | EngineState::Finished)
    }
}

/// Tuning knobs for a hashing run
#[derive(Debug, Clone)]
pub struct HashOptions {
    /// Maximum files open at once
    pub max_open_files: usize,
    /// Optional ceiling on the piece memory admitted readers may claim
    pub max_memory: Option<u64>,
    /// Stop admitting files after the first error
    pub stop_on_first_error: bool,
    /// Bytes requested per read
    pub chunk_size: usize,
}

impl Default for HashOptions {
    fn default() -> Self {
        Self {
            max_open_files: MAX_FILES_OPENED,
            max_memory: None,
            stop_on_first_error: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Digest of one completed piece
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashResult {
    pub index: u32,
    pub digest: [u8; 20],
    /// File whose read completed the piece
    pub file: PathBuf,
}

/// Snapshot of hashing progress
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    /// Percentage of bytes read, rounded to two decimals
    pub percent: f64,
    pub bytes_read: u64,
    pub total_size: u64,
    pub elapsed: Duration,
}

impl Progress {
    /// Average read speed in bytes per second
    pub fn speed(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes_read as f64 / secs
        } else {
            0.0
        }
    }
}

/// Events produced by a running hasher
#[derive(Debug, Clone)]
pub enum HashEvent {
    /// A file was opened for reading
    Open(PathBuf),
    /// A piece was hashed
    Hash(HashResult),
    /// The rounded percentage changed
    Progress(Progress),
    Error(TorrentError),
    /// Every file was read to the end without error
    End,
}

/// Receiving half of a hasher's event stream
pub type HashEvents = mpsc::Receiver<HashEvent>;

/// Round `done / total` to a percentage with two decimals
pub fn round_percent(done: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (done as f64 / total as f64 * 10_000.0).round() / 100.0
}

/// Cloneable handle to pause, resume or stop a hasher from anywhere
#[derive(Debug, Clone)]
pub struct HasherControl {
    state: Arc<watch::Sender<EngineState>>,
}

impl HasherControl {
    fn new() -> Self {
        let (state, _) = watch::channel(EngineState::Initializing);
        Self { state: Arc::new(state) }
    }

    /// Current state
    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    /// Suspend reading. Returns whether the state changed.
    pub fn pause(&self) -> bool {
        self.transition(|s| s == EngineState::Hashing, EngineState::Paused)
    }

    /// Continue after [`pause`](Self::pause)
    pub fn resume(&self) -> bool {
        self.transition(|s| s == EngineState::Paused, EngineState::Hashing)
    }

    /// Resume when paused, pause otherwise
    pub fn toggle(&self) -> bool {
        if self.state() == EngineState::Paused {
            self.resume()
        } else {
            self.pause()
        }
    }

    /// Stop for good: readers are aborted and no further events are emitted
    pub fn stop(&self) -> bool {
        self.transition(|s| !s.is_terminal(), EngineState::Stopped)
    }

    /// Same as [`stop`](Self::stop)
    pub fn destroy(&self) -> bool {
        self.stop()
    }

    fn finish(&self) -> bool {
        self.transition(
            |s| matches!(s, EngineState::Hashing | EngineState::Paused),
            EngineState::Finished,
        )
    }

    fn transition(&self, allowed: impl Fn(EngineState) -> bool, next: EngineState) -> bool {
        self.state.send_if_modified(|state| {
            if allowed(*state) {
                debug!("Hasher state {:?} -> {:?}", state, next);
                *state = next;
                true
            } else {
                false
            }
        })
    }

    fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.state.subscribe()
    }
}

/// Hashes the pieces of a set of files below a root directory
#[derive(Debug)]
pub struct Hasher {
    dir: PathBuf,
    layout: Arc<PieceLayout>,
    options: HashOptions,
    control: HasherControl,
}

impl Hasher {
    /// Resolve the file list and compute the piece layout
    pub async fn new(
        dir: impl AsRef<Path>,
        source: FileSource,
        piece_length: u64,
        options: HashOptions,
    ) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let control = HasherControl::new();

        tokio::fs::metadata(&dir).await.map_err(|e| {
            error!("Root directory {} is not accessible: {}", dir.display(), e);
            TorrentError::from_io(format!("{} does not exist", dir.display()), &dir, &e)
        })?;

        let files = source.resolve(&dir, options.max_open_files).await?;
        if files.is_empty() {
            return Err(TorrentError::validation_error_with_field("No files to hash", "files"));
        }
        for file in &files {
            file.validate()?;
        }

        let layout = map_pieces(&files, piece_length)?;
        if layout.total_size == 0 {
            return Err(TorrentError::validation_error_with_field(
                "Cannot hash zero bytes of content",
                "files",
            ));
        }

        info!(
            "Prepared {} file(s), {} bytes in {} piece(s) of {} bytes",
            files.len(),
            layout.total_size,
            layout.piece_count,
            piece_length
        );
        control.state.send_replace(EngineState::Ready);

        Ok(Self {
            dir,
            layout: Arc::new(layout),
            options,
            control,
        })
    }

    /// Construct and immediately start hashing
    pub async fn spawn(
        dir: impl AsRef<Path>,
        source: FileSource,
        piece_length: u64,
        options: HashOptions,
    ) -> Result<(Self, HashEvents)> {
        let mut hasher = Self::new(dir, source, piece_length, options).await?;
        let events = hasher.start()?;
        Ok((hasher, events))
    }

    /// Begin hashing. Only valid once, from `Ready`.
    pub fn start(&mut self) -> Result<HashEvents> {
        let started = self.control.state.send_if_modified(|state| {
            if *state == EngineState::Ready {
                *state = EngineState::Hashing;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(TorrentError::state_error_with_state(
                "Hashing can only start from the ready state",
                self.control.state(),
            ));
        }

        let pieces = PieceTable::new(&self.layout)?;
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
        let (internal_tx, internal_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);

        let ctx = Arc::new(ReadContext {
            dir: self.dir.clone(),
            piece_length: self.layout.piece_length,
            chunk_size: self.options.chunk_size.max(1),
            pieces,
            internal: internal_tx,
        });
        let driver = Driver {
            ctx,
            layout: Arc::clone(&self.layout),
            options: self.options.clone(),
            control: self.control.clone(),
            events: events_tx,
            internal_rx,
            started: Instant::now(),
            bytes_read: 0,
            last_percent: None,
            errors: 0,
        };

        debug!("Starting hasher driver for {}", self.dir.display());
        tokio::spawn(driver.run());
        Ok(events_rx)
    }

    /// A handle that can pause, resume or stop this hasher
    pub fn control(&self) -> HasherControl {
        self.control.clone()
    }

    pub fn state(&self) -> EngineState {
        self.control.state()
    }

    pub fn pause(&self) -> bool {
        self.control.pause()
    }

    pub fn resume(&self) -> bool {
        self.control.resume()
    }

    pub fn toggle(&self) -> bool {
        self.control.toggle()
    }

    pub fn destroy(&self) -> bool {
        self.control.destroy()
    }

    pub fn layout(&self) -> &PieceLayout {
        &self.layout
    }

    /// Resolved files in layout order
    pub fn files(&self) -> Vec<FileEntry> {
        self.layout.files().cloned().collect()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

enum Internal {
    Open(PathBuf),
    Read(u64),
    Hash(HashResult),
}

/// Shared by every reader task
struct ReadContext {
    dir: PathBuf,
    piece_length: u64,
    chunk_size: usize,
    pieces: PieceTable,
    internal: mpsc::Sender<Internal>,
}

impl ReadContext {
    /// Read one file to its declared length, feeding the piece table
    async fn read_file(&self, task: FileTask, mut gate: watch::Receiver<EngineState>) -> Result<()> {
        let path = task.file.full_path(&self.dir);
        if wait_runnable(&mut gate).await == EngineState::Stopped {
            return Ok(());
        }

        let mut file = File::open(&path).await.map_err(|e| {
            error!("Failed to open {}: {}", path.display(), e);
            TorrentError::from_io("Failed to open file for hashing", &path, &e)
        })?;
        if self.internal.send(Internal::Open(path.clone())).await.is_err() {
            return Ok(());
        }

        let length = task.file.length;
        let mut buf = vec![0u8; (self.chunk_size as u64).min(length.max(1)) as usize];

        for segment in task.segments(self.piece_length) {
            let mut done: u64 = 0;
            while done < segment.len {
                if wait_runnable(&mut gate).await == EngineState::Stopped {
                    trace!(
                        "Reader for {} stopped at byte {}",
                        path.display(),
                        segment.file_offset + done
                    );
                    return Ok(());
                }

                let want = (buf.len() as u64).min(segment.len - done) as usize;
                let n = file.read(&mut buf[..want]).await.map_err(|e| {
                    error!("Failed to read {}: {}", path.display(), e);
                    TorrentError::from_io("Failed to read file for hashing", &path, &e)
                })?;
                if n == 0 {
                    return Err(TorrentError::io_error_with_path(
                        format!(
                            "Unexpected end of file after {} of {} bytes",
                            segment.file_offset + done,
                            length
                        ),
                        path.display().to_string(),
                    ));
                }

                self.write_chunk(segment.piece, segment.piece_offset + done, &buf[..n], &path)
                    .await?;
                done += n as u64;
                if self.internal.send(Internal::Read(n as u64)).await.is_err() {
                    return Ok(());
                }
            }
        }

        trace!("Finished reading {} ({} bytes)", path.display(), length);
        Ok(())
    }

    /// Write `data` into piece `index` at `offset`; the data never crosses
    /// the piece end
    async fn write_chunk(&self, index: u32, offset: u64, data: &[u8], path: &Path) -> Result<()> {
        let (taken, digest) = self.pieces.write(index, offset, data)?;
        if taken != data.len() {
            return Err(TorrentError::state_error(format!(
                "Piece {} took {} of {} bytes",
                index,
                taken,
                data.len()
            )));
        }
        if let Some(digest) = digest {
            let result = HashResult {
                index,
                digest,
                file: path.to_path_buf(),
            };
            // A closed channel means the driver is gone; the next send in
            // read_file notices it
            let _ = self.internal.send(Internal::Hash(result)).await;
        }
        Ok(())
    }
}

/// Block while paused; returns the state that released the wait
async fn wait_runnable(gate: &mut watch::Receiver<EngineState>) -> EngineState {
    match gate.wait_for(|state| *state != EngineState::Paused).await {
        Ok(state) => *state,
        Err(_) => EngineState::Stopped,
    }
}

async fn wait_stopped(gate: &mut watch::Receiver<EngineState>) {
    let _ = gate.wait_for(|state| *state == EngineState::Stopped).await;
}

struct Driver {
    ctx: Arc<ReadContext>,
    layout: Arc<PieceLayout>,
    options: HashOptions,
    control: HasherControl,
    events: mpsc::Sender<HashEvent>,
    internal_rx: mpsc::Receiver<Internal>,
    started: Instant,
    bytes_read: u64,
    last_percent: Option<f64>,
    errors: usize,
}

impl Driver {
    async fn run(mut self) {
        let piece_length = self.layout.piece_length;
        let capacity = Capacity::tasks(self.options.max_open_files).with_byte_budget(self.options.max_memory);
        let mut limiter = Limiter::new(capacity);
        for task in &self.layout.tasks {
            let weight = task.pieces_spanned(piece_length).saturating_mul(piece_length);
            limiter.push(task.clone(), weight);
        }

        let mut drained = limiter.is_idle();
        let mut running: JoinSet<(Ticket, Result<()>)> = JoinSet::new();
        let mut state_rx = self.control.subscribe();
        let mut tick = tokio::time::interval(ADMISSION_TICK);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if self.control.state() == EngineState::Stopped {
                break;
            }

            while let Some((task, ticket)) = limiter.admit() {
                let ctx = Arc::clone(&self.ctx);
                let gate = self.control.subscribe();
                running.spawn(async move {
                    let result = ctx.read_file(task, gate).await;
                    (ticket, result)
                });
            }
            if drained {
                break;
            }

            tokio::select! {
                Some(message) = self.internal_rx.recv() => self.handle(message).await,
                Some(joined) = running.join_next() => match joined {
                    Ok((ticket, result)) => {
                        if let Err(e) = result {
                            self.fail(e, &mut limiter).await;
                        }
                        drained = limiter.finish(ticket);
                    }
                    Err(e) => {
                        // The ticket went down with the task, so capacity
                        // accounting is lost; end the run
                        error!("Reader task failed: {}", e);
                        limiter.halt();
                        self.fail(TorrentError::state_error(format!("Reader task failed: {}", e)), &mut limiter)
                            .await;
                        self.control.stop();
                    }
                },
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tick.tick() => {}
            }
        }

        if self.control.state() == EngineState::Stopped {
            running.abort_all();
            info!(
                "Hashing stopped after {} of {} bytes",
                self.bytes_read, self.layout.total_size
            );
            return;
        }

        // Readers are done, but their last messages may still be queued
        while let Ok(message) = self.internal_rx.try_recv() {
            self.handle(message).await;
        }

        if self.errors > 0 {
            warn!("Hashing ended with {} error(s)", self.errors);
            self.control.stop();
            return;
        }

        if self.control.finish() {
            info!(
                "Hashed {} piece(s) in {:.2?}",
                self.layout.piece_count,
                self.started.elapsed()
            );
            self.emit(HashEvent::End).await;
        }
    }

    async fn handle(&mut self, message: Internal) {
        let delivered = match message {
            Internal::Open(path) => self.emit(HashEvent::Open(path)).await,
            Internal::Hash(result) => self.emit(HashEvent::Hash(result)).await,
            Internal::Read(n) => {
                self.bytes_read += n;
                let percent = round_percent(self.bytes_read, self.layout.total_size);
                if self.last_percent == Some(percent) {
                    true
                } else {
                    self.last_percent = Some(percent);
                    let progress = Progress {
                        percent,
                        bytes_read: self.bytes_read,
                        total_size: self.layout.total_size,
                        elapsed: self.started.elapsed(),
                    };
                    self.emit(HashEvent::Progress(progress)).await
                }
            }
        };

        if !delivered && self.control.stop() {
            debug!("Event receiver dropped, hasher stopped");
        }
    }

    async fn fail(&mut self, err: TorrentError, limiter: &mut Limiter<FileTask>) {
        self.errors += 1;
        error!("Hashing error: {}", err);
        if self.options.stop_on_first_error && !limiter.is_halted() {
            let dropped = limiter.halt();
            warn!("Stopping on first error, {} file(s) not hashed", dropped);
        }
        if !self.emit(HashEvent::Error(err)).await {
            self.control.stop();
        }
    }

    /// Deliver an event unless the hasher was stopped. Returns `false` when
    /// the event was not delivered.
    async fn emit(&self, event: HashEvent) -> bool {
        if self.control.state() == EngineState::Stopped {
            return false;
        }
        let mut gate = self.control.subscribe();
        tokio::select! {
            biased;
            _ = wait_stopped(&mut gate) => false,
            sent = self.events.send(event) => sent.is_ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::piece::sha1_digest;
    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};
    use tempfile::TempDir;

    /// Write files with random content; returns the concatenated bytes
    fn fixture(dir: &Path, files: &[(&str, usize)], seed: u64) -> Vec<u8> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut all = Vec::new();
        for (name, len) in files {
            let mut data = vec![0u8; *len];
            rng.fill_bytes(&mut data);
            let path = dir.join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, &data).unwrap();
            all.extend_from_slice(&data);
        }
        all
    }

    fn entries(files: &[(&str, usize)]) -> FileSource {
        FileSource::Entries(
            files
                .iter()
                .map(|(name, len)| FileEntry::new(name.split('/').map(String::from).collect(), *len as u64))
                .collect(),
        )
    }

    fn expected_digests(data: &[u8], piece_length: usize) -> Vec<[u8; 20]> {
        data.chunks(piece_length).map(sha1_digest).collect()
    }

    /// Drain the stream; returns digests by index, errors, and whether End arrived
    async fn collect(mut events: HashEvents, pieces: usize) -> (Vec<Option<[u8; 20]>>, Vec<TorrentError>, Vec<f64>, bool) {
        let mut digests = vec![None; pieces];
        let mut errors = Vec::new();
        let mut percents = Vec::new();
        let mut ended = false;
        while let Some(event) = events.recv().await {
            match event {
                HashEvent::Hash(result) => {
                    assert!(digests[result.index as usize].is_none(), "piece hashed twice");
                    digests[result.index as usize] = Some(result.digest);
                }
                HashEvent::Error(e) => errors.push(e),
                HashEvent::Progress(p) => percents.push(p.percent),
                HashEvent::End => ended = true,
                HashEvent::Open(_) => {}
            }
        }
        (digests, errors, percents, ended)
    }

    const FILES: &[(&str, usize)] = &[
        ("a.bin", 2_500),
        ("empty", 0),
        ("dir/b.bin", 1),
        ("dir/c.bin", 999),
        ("d.bin", 7_321),
    ];

    #[tokio::test]
    async fn test_digests_match_sequential_hash() {
        let tmp = TempDir::new().unwrap();
        let data = fixture(tmp.path(), FILES, 1);
        let options = HashOptions {
            max_open_files: 2,
            chunk_size: 333,
            ..Default::default()
        };

        let (hasher, events) = Hasher::spawn(tmp.path(), entries(FILES), 1_000, options).await.unwrap();
        assert_eq!(hasher.layout().piece_count, 11);

        let (digests, errors, percents, ended) = collect(events, 11).await;
        assert!(errors.is_empty());
        assert!(ended);
        assert_eq!(percents.last().copied(), Some(100.0));
        assert!(percents.windows(2).all(|w| w[0] < w[1]));

        let digests: Vec<_> = digests.into_iter().map(Option::unwrap).collect();
        assert_eq!(digests, expected_digests(&data, 1_000));
        assert_eq!(hasher.state(), EngineState::Finished);
    }

    #[tokio::test]
    async fn test_byte_budget_still_hashes_everything() {
        let tmp = TempDir::new().unwrap();
        let data = fixture(tmp.path(), FILES, 2);
        let options = HashOptions {
            max_memory: Some(1),
            chunk_size: 4_096,
            ..Default::default()
        };

        let (_hasher, events) = Hasher::spawn(tmp.path(), entries(FILES), 512, options).await.unwrap();
        let pieces = data.len().div_ceil(512);
        let (digests, errors, _, ended) = collect(events, pieces).await;
        assert!(errors.is_empty() && ended);
        let digests: Vec<_> = digests.into_iter().map(Option::unwrap).collect();
        assert_eq!(digests, expected_digests(&data, 512));
    }

    #[tokio::test]
    async fn test_chunks_larger_than_pieces_split_at_piece_ends() {
        let tmp = TempDir::new().unwrap();
        let data = fixture(tmp.path(), FILES, 5);
        let options = HashOptions {
            max_open_files: 1,
            chunk_size: 64 * 1024,
            ..Default::default()
        };

        let (hasher, events) = Hasher::spawn(tmp.path(), entries(FILES), 97, options).await.unwrap();
        let pieces = data.len().div_ceil(97);
        let (digests, errors, percents, ended) = collect(events, pieces).await;
        assert!(errors.is_empty() && ended);
        assert_eq!(percents.last().copied(), Some(100.0));
        let digests: Vec<_> = digests.into_iter().map(Option::unwrap).collect();
        assert_eq!(digests, expected_digests(&data, 97));
        assert_eq!(hasher.state(), EngineState::Finished);
    }

    #[tokio::test]
    async fn test_pause_and_resume() {
        let tmp = TempDir::new().unwrap();
        let data = fixture(tmp.path(), FILES, 3);

        let mut hasher = Hasher::new(tmp.path(), entries(FILES), 700, HashOptions::default())
            .await
            .unwrap();
        let mut events = hasher.start().unwrap();
        assert!(hasher.pause());
        assert!(!hasher.pause());
        assert_eq!(hasher.state(), EngineState::Paused);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(events.try_recv().is_err());

        assert!(hasher.toggle());
        assert_eq!(hasher.state(), EngineState::Hashing);

        let pieces = data.len().div_ceil(700);
        let (digests, errors, _, ended) = collect(events, pieces).await;
        assert!(errors.is_empty() && ended);
        let digests: Vec<_> = digests.into_iter().map(Option::unwrap).collect();
        assert_eq!(digests, expected_digests(&data, 700));
    }

    #[tokio::test]
    async fn test_stop_suppresses_events() {
        let tmp = TempDir::new().unwrap();
        fixture(tmp.path(), FILES, 4);

        let (hasher, mut events) = Hasher::spawn(tmp.path(), entries(FILES), 100, HashOptions::default())
            .await
            .unwrap();
        assert!(hasher.destroy());
        assert!(!hasher.control().stop());
        assert!(events.recv().await.is_none());
        assert_eq!(hasher.state(), EngineState::Stopped);
    }

    #[tokio::test]
    async fn test_start_requires_ready() {
        let tmp = TempDir::new().unwrap();
        fixture(tmp.path(), &[("f", 10)], 5);

        let (mut hasher, _events) = Hasher::spawn(tmp.path(), entries(&[("f", 10)]), 4, HashOptions::default())
            .await
            .unwrap();
        let err = hasher.start().unwrap_err();
        assert!(matches!(err, TorrentError::StateError { .. }));

        let mut stopped = Hasher::new(tmp.path(), entries(&[("f", 10)]), 4, HashOptions::default())
            .await
            .unwrap();
        stopped.control().stop();
        assert!(stopped.start().is_err());
        assert!(!stopped.resume());
    }

    #[tokio::test]
    async fn test_missing_root_and_empty_content() {
        let tmp = TempDir::new().unwrap();
        let err = Hasher::new(tmp.path().join("nope"), entries(&[("f", 1)]), 4, HashOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TorrentError::IoError { .. }));

        fixture(tmp.path(), &[("empty", 0)], 6);
        let err = Hasher::new(tmp.path(), entries(&[("empty", 0)]), 4, HashOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TorrentError::ValidationError { .. }));

        let err = Hasher::new(tmp.path(), FileSource::Entries(vec![]), 4, HashOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TorrentError::ValidationError { .. }));
    }

    #[tokio::test]
    async fn test_unsafe_entry_rejected() {
        let tmp = TempDir::new().unwrap();
        let source = FileSource::Entries(vec![FileEntry::new(vec!["..".into(), "x".into()], 1)]);
        let err = Hasher::new(tmp.path(), source, 4, HashOptions::default()).await.unwrap_err();
        assert!(matches!(err, TorrentError::ValidationError { .. }));
    }

    #[tokio::test]
    async fn test_missing_file_reports_error() {
        let tmp = TempDir::new().unwrap();
        fixture(tmp.path(), &[("present", 50)], 7);

        let source = entries(&[("present", 50), ("missing", 50)]);
        let (hasher, events) = Hasher::spawn(tmp.path(), source, 16, HashOptions::default()).await.unwrap();
        let (_, errors, _, ended) = collect(events, 7).await;
        assert!(!ended);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], TorrentError::IoError { .. }));
        assert_eq!(hasher.state(), EngineState::Stopped);
    }

    #[tokio::test]
    async fn test_short_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        fixture(tmp.path(), &[("short", 10)], 8);

        let (_hasher, events) = Hasher::spawn(tmp.path(), entries(&[("short", 20)]), 8, HashOptions::default())
            .await
            .unwrap();
        let (_, errors, _, ended) = collect(events, 3).await;
        assert!(!ended);
        assert!(errors[0].to_string().contains("Unexpected end of file"));
    }

    #[tokio::test]
    async fn test_stop_on_first_error_skips_remaining_files() {
        let tmp = TempDir::new().unwrap();
        fixture(tmp.path(), &[("b", 64), ("c", 64)], 9);

        let options = HashOptions {
            max_open_files: 1,
            stop_on_first_error: true,
            ..Default::default()
        };
        let source = entries(&[("a-missing", 64), ("b", 64), ("c", 64)]);
        let (_hasher, events) = Hasher::spawn(tmp.path(), source, 64, options).await.unwrap();
        let (digests, errors, _, ended) = collect(events, 3).await;
        assert!(!ended);
        assert_eq!(errors.len(), 1);
        assert!(digests.iter().all(Option::is_none));
    }

    #[test]
    fn test_round_percent() {
        assert_eq!(round_percent(1, 3), 33.33);
        assert_eq!(round_percent(2, 3), 66.67);
        assert_eq!(round_percent(3, 3), 100.0);
        assert_eq!(round_percent(0, 0), 100.0);
    }
}
