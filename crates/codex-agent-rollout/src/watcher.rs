//! The rollout watcher: debounced filesystem notifications turned into
//! tailed-append events (for watched session files) and new-session
//! discovery events (for watched session directories). One watcher
//! instance owns both kinds of watch and enforces at most one in-flight
//! read per path at a time, queuing further change notifications for a
//! path that is already being read instead of starting a second
//! concurrent read.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use codex_agent_core::Line;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, debug_span, warn};

use crate::reader::stream_events;

const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);
const SESSION_FILE_PREFIX: &str = "rollout-";
const SESSION_FILE_SUFFIX: &str = ".jsonl";

/// A coalesced, classified change delivered to watcher subscribers.
#[derive(Debug, Clone)]
pub enum RolloutEvent {
    /// New lines were appended to a watched session file.
    Appended { path: PathBuf, lines: Vec<Line> },
    /// A new session file appeared in a watched directory.
    NewSessionFile { path: PathBuf },
    /// A watched file could not be read; the offset is unchanged.
    ReadError { path: PathBuf, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchKind {
    File,
    Directory,
}

enum Command {
    WatchFile(PathBuf, Option<u64>),
    WatchDirectory(PathBuf),
    Stop,
}

enum LoopEvent {
    Command(Command),
    Raw(notify::Result<notify::Event>),
    ReadDone {
        path: PathBuf,
        result: Result<(Vec<Line>, u64), String>,
    },
}

/// A running rollout watcher. Dropping this handle stops the watch loop
/// and the underlying OS watcher.
pub struct RolloutWatcher {
    commands: mpsc::UnboundedSender<Command>,
}

impl RolloutWatcher {
    /// Start a watcher with the default 100ms debounce interval.
    pub fn spawn() -> notify::Result<(Self, mpsc::Receiver<RolloutEvent>)> {
        Self::spawn_with_debounce(DEFAULT_DEBOUNCE)
    }

    pub fn spawn_with_debounce(
        debounce: Duration,
    ) -> notify::Result<(Self, mpsc::Receiver<RolloutEvent>)> {
        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel();
        let mut inner: RecommendedWatcher = notify::recommended_watcher(move |res| {
            let _ = raw_tx.send(res);
        })?;

        let (command_tx, mut command_rx) = mpsc::unbounded_channel::<Command>();
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::channel(256);

        tokio::spawn(async move {
            let mut kinds: HashMap<PathBuf, WatchKind> = HashMap::new();
            let mut offsets: HashMap<PathBuf, u64> = HashMap::new();
            let mut known_session_files: HashMap<PathBuf, HashSet<PathBuf>> = HashMap::new();
            let mut in_flight: HashSet<PathBuf> = HashSet::new();
            let mut pending: HashSet<PathBuf> = HashSet::new();
            let mut next_allowed_at = Instant::now();

            loop {
                let has_pending = !pending.is_empty();
                let deadline = if has_pending && Instant::now() < next_allowed_at {
                    next_allowed_at
                } else {
                    Instant::now() + Duration::from_secs(60 * 60 * 24 * 365)
                };
                let timer = sleep_until(deadline);
                tokio::pin!(timer);

                let event = tokio::select! {
                    cmd = command_rx.recv() => match cmd {
                        Some(c) => LoopEvent::Command(c),
                        None => LoopEvent::Command(Command::Stop),
                    },
                    raw = raw_rx.recv() => match raw {
                        Some(r) => LoopEvent::Raw(r),
                        None => break,
                    },
                    done = done_rx.recv() => match done {
                        Some((path, result)) => LoopEvent::ReadDone { path, result },
                        None => continue,
                    },
                    _ = &mut timer => {
                        flush_ready(
                            &mut pending,
                            &mut in_flight,
                            &kinds,
                            &mut offsets,
                            &mut known_session_files,
                            &events_tx,
                            &done_tx,
                        );
                        next_allowed_at = Instant::now() + debounce;
                        continue;
                    }
                };

                match event {
                    LoopEvent::Command(Command::Stop) => break,
                    LoopEvent::Command(Command::WatchFile(path, start_offset)) => {
                        let _span = debug_span!("rollout_watch", path = %path.display()).entered();
                        if !kinds.contains_key(&path) {
                            if let Err(err) = inner.watch(&path, RecursiveMode::NonRecursive) {
                                warn!("failed to watch {}: {err}", path.display());
                            }
                            kinds.insert(path.clone(), WatchKind::File);
                            let current_size =
                                tokio::fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
                            let initial_offset = start_offset.unwrap_or(current_size);
                            offsets.insert(path.clone(), initial_offset);
                            // An explicit offset behind the current size means
                            // there is already unread content; flush it right
                            // away rather than waiting on a filesystem event
                            // that may never arrive.
                            if initial_offset < current_size {
                                pending.insert(path);
                                flush_ready(
                                    &mut pending,
                                    &mut in_flight,
                                    &kinds,
                                    &mut offsets,
                                    &mut known_session_files,
                                    &events_tx,
                                    &done_tx,
                                );
                                next_allowed_at = Instant::now() + debounce;
                            }
                        }
                        // Idempotent: re-watching an already-watched file is a no-op,
                        // per §4.3, and never resets its offset.
                    }
                    LoopEvent::Command(Command::WatchDirectory(path)) => {
                        let _span = debug_span!("rollout_watch_dir", path = %path.display()).entered();
                        if let Err(err) = inner.watch(&path, RecursiveMode::NonRecursive) {
                            warn!("failed to watch {}: {err}", path.display());
                        }
                        kinds.insert(path.clone(), WatchKind::Directory);
                        known_session_files
                            .entry(path.clone())
                            .or_insert_with(HashSet::new);
                        pending.insert(path);
                    }
                    LoopEvent::Raw(Ok(raw_event)) => {
                        for affected in raw_event.paths {
                            if let Some(tracked) = nearest_tracked_path(&kinds, &affected) {
                                pending.insert(tracked);
                            }
                        }
                        if !pending.is_empty() && Instant::now() >= next_allowed_at {
                            flush_ready(
                                &mut pending,
                                &mut in_flight,
                                &kinds,
                                &mut offsets,
                                &mut known_session_files,
                                &events_tx,
                                &done_tx,
                            );
                            next_allowed_at = Instant::now() + debounce;
                        }
                    }
                    LoopEvent::Raw(Err(err)) => {
                        warn!("rollout watcher received a filesystem error: {err}");
                    }
                    LoopEvent::ReadDone { path, result } => {
                        in_flight.remove(&path);
                        match result {
                            Ok((lines, new_offset)) => {
                                offsets.insert(path.clone(), new_offset);
                                if !lines.is_empty() {
                                    let _ = events_tx
                                        .send(RolloutEvent::Appended { path, lines })
                                        .await;
                                }
                            }
                            Err(message) => {
                                let _ = events_tx.send(RolloutEvent::ReadError { path, message }).await;
                            }
                        }
                        // A change may have arrived while this path's read
                        // was in flight; if so it's still in `pending` and
                        // will be picked up on the next flush.
                    }
                }
            }
        });

        Ok((
            RolloutWatcher {
                commands: command_tx,
            },
            events_rx,
        ))
    }

    /// Begin tailing a single rollout file for appended lines.
    ///
    /// Per §4.3, the initial offset defaults to the file's current size, so
    /// pre-existing content is never emitted; pass `start_offset` to resume
    /// a specific byte position instead. Idempotent: watching an
    /// already-watched file does not reset its offset.
    pub fn watch_file(&self, path: &Path) -> notify::Result<()> {
        self.watch_file_from(path, None)
    }

    pub fn watch_file_from(&self, path: &Path, start_offset: Option<u64>) -> notify::Result<()> {
        let _ = self
            .commands
            .send(Command::WatchFile(path.to_path_buf(), start_offset));
        Ok(())
    }

    /// Begin watching a directory for newly created session files.
    pub fn watch_directory(&self, path: &Path) -> notify::Result<()> {
        let _ = self
            .commands
            .send(Command::WatchDirectory(path.to_path_buf()));
        Ok(())
    }

    /// Stop the watch loop. Also triggered by dropping this handle.
    pub fn stop(&self) {
        let _ = self.commands.send(Command::Stop);
    }
}

impl Drop for RolloutWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Find the watched root (file or directory) that `changed` belongs to.
fn nearest_tracked_path(
    kinds: &HashMap<PathBuf, WatchKind>,
    changed: &Path,
) -> Option<PathBuf> {
    if let Some(kind) = kinds.get(changed) {
        if *kind == WatchKind::File {
            return Some(changed.to_path_buf());
        }
    }
    let parent = changed.parent()?;
    if kinds.get(parent) == Some(&WatchKind::Directory) {
        return Some(parent.to_path_buf());
    }
    None
}

fn flush_ready(
    pending: &mut HashSet<PathBuf>,
    in_flight: &mut HashSet<PathBuf>,
    kinds: &HashMap<PathBuf, WatchKind>,
    offsets: &mut HashMap<PathBuf, u64>,
    known_session_files: &mut HashMap<PathBuf, HashSet<PathBuf>>,
    events_tx: &mpsc::Sender<RolloutEvent>,
    done_tx: &mpsc::UnboundedSender<(PathBuf, Result<(Vec<Line>, u64), String>)>,
) {
    let ready: Vec<PathBuf> = pending
        .iter()
        .filter(|p| !in_flight.contains(*p))
        .cloned()
        .collect();
    for path in ready {
        pending.remove(&path);
        match kinds.get(&path) {
            Some(WatchKind::File) => {
                in_flight.insert(path.clone());
                let offset = *offsets.get(&path).unwrap_or(&0);
                let done_tx = done_tx.clone();
                tokio::spawn(async move {
                    let result = stream_events(&path, offset)
                        .await
                        .map_err(|e| e.to_string());
                    let _ = done_tx.send((path, result));
                });
            }
            Some(WatchKind::Directory) => {
                let seen = known_session_files.entry(path.clone()).or_default();
                if let Ok(mut read_dir) = std::fs::read_dir(&path) {
                    let mut discovered = Vec::new();
                    while let Some(Ok(entry)) = read_dir.next() {
                        let entry_path = entry.path();
                        let is_session_file = entry_path
                            .file_name()
                            .and_then(|n| n.to_str())
                            .map(|n| n.starts_with(SESSION_FILE_PREFIX) && n.ends_with(SESSION_FILE_SUFFIX))
                            .unwrap_or(false);
                        if is_session_file && seen.insert(entry_path.clone()) {
                            discovered.push(entry_path);
                        }
                    }
                    for new_file in discovered {
                        debug!(path = %new_file.display(), "discovered new session file");
                        let events_tx = events_tx.clone();
                        let new_file_for_send = new_file.clone();
                        tokio::spawn(async move {
                            let _ = events_tx
                                .send(RolloutEvent::NewSessionFile {
                                    path: new_file_for_send,
                                })
                                .await;
                        });
                    }
                }
            }
            None => {}
        }
    }
}

impl RolloutWatcher {
    /// Start watching `path`, inferring file-vs-directory from the
    /// filesystem rather than requiring the caller to know.
    pub fn watch(&self, path: &Path, mode: RecursiveMode) -> notify::Result<()> {
        let _ = mode;
        if path.is_dir() {
            self.watch_directory(path)
        } else {
            self.watch_file(path)
        }
    }
}
