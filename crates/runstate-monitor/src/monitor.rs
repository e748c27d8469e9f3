//! Change monitor
//!
//! A `ChangeMonitor` owns a subscription connection and lends it to one
//! background thread. The thread classifies every record it reads and sends
//! the resulting notifications over a channel; consumers drain that channel
//! with [`ChangeMonitor::get_notifications`].
//!
//! Stopping the thread hands the subscription back through its `JoinHandle`,
//! which is how the monitor rebinds to a relocated program-parent directory.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use runstate_core::{
    layout, Notification, RunStateError, RunStateResult, DEFAULT_PROGRAM_PARENT,
    GLOBAL_STATE_PATH, PARENT_DIR_PATH,
};
use runstate_store::{ChangeFeed, FilterKind, VariableStore};
use tracing::{debug, trace, warn};

use crate::classify::classify;

/// Monitor configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Longest the thread blocks on the feed before rechecking its stop flag
    pub poll_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl MonitorConfig {
    /// Short polls, for tests and interactive tools
    pub fn responsive() -> Self {
        Self {
            poll_interval: Duration::from_millis(5),
        }
    }

    /// Long polls, for idle long-running coordinators
    pub fn relaxed() -> Self {
        Self {
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Read the program-parent directory from the store.
///
/// A missing or empty `ReadoutParentDir` means the default `/RunState`.
pub fn resolve_program_parent(store: &dyn VariableStore) -> RunStateResult<String> {
    match store.get(PARENT_DIR_PATH) {
        Ok(dir) if dir.trim().is_empty() => Ok(DEFAULT_PROGRAM_PARENT.to_string()),
        Ok(dir) => layout::normalize(dir.trim()).ok_or_else(|| {
            RunStateError::InvalidArgument(format!("program parent {} is not absolute", dir))
        }),
        Err(e) if e.is_not_found() => Ok(DEFAULT_PROGRAM_PARENT.to_string()),
        Err(e) => Err(e),
    }
}

/// Background change monitor
pub struct ChangeMonitor {
    /// Parked subscription while the thread is stopped
    feed: Option<Box<dyn ChangeFeed>>,
    worker: Option<JoinHandle<Box<dyn ChangeFeed>>>,
    stop: Arc<AtomicBool>,
    sender: Sender<Notification>,
    receiver: Receiver<Notification>,
    parent_path: String,
    config: MonitorConfig,
}

impl ChangeMonitor {
    /// Resolve the program-parent directory and start the monitor thread
    pub fn new(
        requests: &dyn VariableStore,
        feed: Box<dyn ChangeFeed>,
        config: MonitorConfig,
    ) -> RunStateResult<Self> {
        let parent_path = resolve_program_parent(requests)?;
        let (sender, receiver) = mpsc::channel();

        let mut monitor = ChangeMonitor {
            feed: Some(feed),
            worker: None,
            stop: Arc::new(AtomicBool::new(false)),
            sender,
            receiver,
            parent_path,
            config,
        };
        monitor.start()?;
        Ok(monitor)
    }

    /// Directory whose children are treated as programs
    pub fn program_parent_path(&self) -> &str {
        &self.parent_path
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// True while the monitor thread is alive
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Bind the feed to the current parent and spawn the thread
    fn start(&mut self) -> RunStateResult<()> {
        if self.worker.is_some() {
            return Ok(());
        }
        let mut feed = self
            .feed
            .take()
            .ok_or_else(|| RunStateError::Internal("monitor subscription was lost".into()))?;

        if let Err(e) = bind(feed.as_mut(), &self.parent_path) {
            self.feed = Some(feed);
            return Err(e);
        }

        self.stop.store(false, Ordering::Release);
        let stop = Arc::clone(&self.stop);
        let sender = self.sender.clone();
        let parent = self.parent_path.clone();
        let poll = self.config.poll_interval;

        let handle = thread::Builder::new()
            .name("runstate-monitor".into())
            .spawn(move || run(feed, sender, stop, parent, poll))
            .map_err(|e| RunStateError::Internal(format!("monitor thread: {}", e)))?;

        debug!(parent = %self.parent_path, "monitor started");
        self.worker = Some(handle);
        Ok(())
    }

    /// Signal the thread, join it and take back the subscription
    fn stop(&mut self) -> RunStateResult<()> {
        let Some(handle) = self.worker.take() else {
            return Ok(());
        };
        self.stop.store(true, Ordering::Release);

        let mut feed = handle
            .join()
            .map_err(|_| RunStateError::Internal("monitor thread panicked".into()))?;

        let result = unbind(feed.as_mut(), &self.parent_path);
        self.feed = Some(feed);
        debug!(parent = %self.parent_path, "monitor stopped");
        result
    }

    /// Rebind to a new program-parent directory.
    ///
    /// Notifications already queued are kept; records read after the restart
    /// are classified against `parent`.
    pub fn update_program_parent_path(&mut self, parent: &str) -> RunStateResult<()> {
        let parent = layout::normalize(parent).ok_or_else(|| {
            RunStateError::InvalidArgument(format!("program parent {} is not absolute", parent))
        })?;

        self.stop()?;
        debug!(from = %self.parent_path, to = %parent, "rebinding monitor");
        self.parent_path = parent;
        self.start()
    }

    /// Take queued notifications.
    ///
    /// `max` of `None` is unlimited. A `timeout` of `None` waits forever when
    /// nothing is queued; `Some(Duration::ZERO)` never blocks.
    pub fn get_notifications(
        &self,
        max: Option<usize>,
        timeout: Option<Duration>,
    ) -> RunStateResult<Vec<Notification>> {
        let limit = match max {
            Some(0) => {
                return Err(RunStateError::InvalidArgument(
                    "notification limit must be positive".into(),
                ))
            }
            Some(n) => n,
            None => usize::MAX,
        };

        let mut out = Vec::new();
        self.drain(&mut out, limit);
        if !out.is_empty() {
            return Ok(out);
        }

        let first = match timeout {
            Some(t) if t.is_zero() => None,
            Some(t) => match self.receiver.recv_timeout(t) {
                Ok(n) => Some(n),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(RunStateError::Internal("notification channel closed".into()))
                }
            },
            // The monitor holds a sender, so this only returns with a notification
            None => self.receiver.recv().ok(),
        };

        if let Some(n) = first {
            out.push(n);
            self.drain(&mut out, limit);
        }
        Ok(out)
    }

    fn drain(&self, out: &mut Vec<Notification>, limit: usize) {
        while out.len() < limit {
            match self.receiver.try_recv() {
                Ok(n) => out.push(n),
                Err(_) => break,
            }
        }
    }
}

impl std::fmt::Debug for ChangeMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeMonitor")
            .field("parent_path", &self.parent_path)
            .field("running", &self.is_running())
            .field("config", &self.config)
            .finish()
    }
}

impl Drop for ChangeMonitor {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(error = %e, "monitor did not shut down cleanly");
        }
    }
}

fn bind(feed: &mut dyn ChangeFeed, parent: &str) -> RunStateResult<()> {
    feed.subscribe(GLOBAL_STATE_PATH)?;
    feed.subscribe(parent)?;
    feed.add_filter(FilterKind::Accept, GLOBAL_STATE_PATH)?;
    feed.add_filter(FilterKind::Accept, &layout::join(parent, "*/State"))?;
    feed.add_filter(FilterKind::Accept, parent)?;
    Ok(())
}

fn unbind(feed: &mut dyn ChangeFeed, parent: &str) -> RunStateResult<()> {
    feed.clear_filters();
    feed.unsubscribe(GLOBAL_STATE_PATH)?;
    feed.unsubscribe(parent)?;
    Ok(())
}

/// Monitor thread body. Returns the feed so the owner can reuse it.
fn run(
    mut feed: Box<dyn ChangeFeed>,
    sender: Sender<Notification>,
    stop: Arc<AtomicBool>,
    parent: String,
    poll: Duration,
) -> Box<dyn ChangeFeed> {
    while !stop.load(Ordering::Acquire) {
        if !feed.wait_msg(poll) {
            continue;
        }
        let record = match feed.read() {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "dropping unreadable change record");
                continue;
            }
        };

        match classify(&record, &parent) {
            Some(notification) => {
                trace!(kind = notification.kind(), %notification, "notification queued");
                if sender.send(notification).is_err() {
                    break;
                }
            }
            None => trace!(%record, "unclassified change dropped"),
        }
    }
    feed
}
