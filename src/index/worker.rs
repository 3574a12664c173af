//! Background refresh thread
//!
//! Runs [`Refresher::refresh`] on a timer and on demand. Requests that arrive
//! while a refresh is running are folded into a single follow-up.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use super::{RefreshOutcome, Refresher};
use crate::logging::{log_debug, log_info, log_warning};

enum Command {
    Refresh,
    Shutdown,
}

pub struct RefreshWorker {
    sender: Sender<Command>,
    thread: Option<JoinHandle<()>>,
}

impl RefreshWorker {
    /// Start the worker. `interval` of `None` disables timed refreshes.
    pub fn spawn(
        refresher: Arc<Refresher>,
        interval: Option<Duration>,
        refresh_on_start: bool,
    ) -> std::io::Result<Self> {
        let (sender, receiver) = unbounded();
        if refresh_on_start {
            let _ = sender.send(Command::Refresh);
        }

        let thread = thread::Builder::new()
            .name("steam-search-refresh".to_string())
            .spawn(move || run(&refresher, &receiver, interval))?;

        Ok(Self {
            sender,
            thread: Some(thread),
        })
    }

    /// Queue a refresh; returns false if the worker has stopped
    pub fn trigger(&self) -> bool {
        self.sender.send(Command::Refresh).is_ok()
    }

    /// Stop the worker and wait for a running refresh to finish
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.sender.send(Command::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log_warning("Refresh worker panicked");
            }
        }
    }
}

impl Drop for RefreshWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(refresher: &Refresher, receiver: &Receiver<Command>, interval: Option<Duration>) {
    log_debug("Refresh worker started");

    loop {
        let command = match interval {
            Some(interval) => match receiver.recv_timeout(interval) {
                Ok(command) => command,
                Err(RecvTimeoutError::Timeout) => Command::Refresh,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match receiver.recv() {
                Ok(command) => command,
                Err(_) => break,
            },
        };

        if let Command::Shutdown = command {
            break;
        }

        // Everything queued so far is covered by this refresh
        let mut shutdown = false;
        for queued in receiver.try_iter() {
            if let Command::Shutdown = queued {
                shutdown = true;
            }
        }
        if shutdown {
            break;
        }

        match refresher.refresh() {
            Ok(RefreshOutcome::Completed(report)) => log_debug(&format!(
                "Background refresh done: {} record(s), generation {}",
                report.records, report.generation
            )),
            Ok(RefreshOutcome::Coalesced) => {}
            // Already logged by the refresher
            Err(_) => {}
        }
    }

    log_info("Refresh worker stopped");
}
