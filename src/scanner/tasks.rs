//! Fire-and-forget parse tasks with an explicit join point.
//!
//! Tasks run on a small pool of worker threads fed through a channel. Each
//! task reports back on its own reply channel so results are collected in
//! capture order regardless of which worker finished first.

use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, SendError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, error, warn};

use super::progress::{ProgressEvent, ProgressSink};
use crate::model::{ParsedRecord, RecordKind};

type Job = Box<dyn FnOnce() + Send + 'static>;
type Reply = thread::Result<Option<ParsedRecord>>;

/// Default worker count: the machine's parallelism, kept within 2..=8.
fn default_workers() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(4)
        .clamp(2, 8)
}

/// Pulls jobs until the sending side is dropped.
fn run_worker(queue: &Mutex<Receiver<Job>>) {
    loop {
        let job = match queue.lock() {
            Ok(rx) => rx.recv(),
            Err(_) => return,
        };
        match job {
            Ok(job) => job(),
            Err(_) => return,
        }
    }
}

/// In-flight parse tasks of one pass, in capture order.
pub struct ScanTaskSet {
    kind: RecordKind,
    progress: Arc<dyn ProgressSink>,
    limit: usize,
    sender: Option<Sender<Job>>,
    queue: Arc<Mutex<Receiver<Job>>>,
    workers: Vec<JoinHandle<()>>,
    pending: Vec<(u32, Receiver<Reply>)>,
}

/// Results of joining a task set.
#[derive(Debug, Default)]
pub struct Joined {
    pub records: Vec<ParsedRecord>,
    /// Tasks that panicked or never reported back.
    pub failed: usize,
}

impl ScanTaskSet {
    pub fn new(kind: RecordKind, progress: Arc<dyn ProgressSink>) -> Self {
        Self::with_workers(kind, progress, default_workers())
    }

    /// Task set running at most `workers` parses at once. Workers are
    /// started as tasks arrive.
    pub fn with_workers(kind: RecordKind, progress: Arc<dyn ProgressSink>, workers: usize) -> Self {
        let (sender, queue) = mpsc::channel();
        Self {
            kind,
            progress,
            limit: workers.max(1),
            sender: Some(sender),
            queue: Arc::new(Mutex::new(queue)),
            workers: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Sequence numbers of spawned tasks, in spawn order.
    pub fn sequences(&self) -> Vec<u32> {
        self.pending.iter().map(|(seq, _)| *seq).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn grow(&mut self) {
        if self.workers.len() >= self.limit || self.workers.len() >= self.pending.len() + 1 {
            return;
        }
        let queue = self.queue.clone();
        let spawned = thread::Builder::new()
            .name(format!("{}-parser-{}", self.kind, self.workers.len() + 1))
            .spawn(move || run_worker(&queue));
        match spawned {
            Ok(handle) => self.workers.push(handle),
            Err(e) => warn!(kind = %self.kind, "Failed to start parse worker: {}", e),
        }
    }

    /// Queues `parse` on the worker pool. Navigation continues immediately.
    /// With no worker available the task runs inline.
    pub fn spawn<F>(&mut self, seq: u32, parse: F)
    where
        F: FnOnce() -> Option<ParsedRecord> + Send + 'static,
    {
        let kind = self.kind;
        let progress = self.progress.clone();
        progress.report(ProgressEvent::Queued(kind));

        let (reply, replies) = mpsc::channel();
        let job: Job = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(parse));
            if matches!(outcome, Ok(Some(_))) {
                progress.report(ProgressEvent::Parsed(kind));
            }
            let _ = reply.send(outcome);
        });

        self.grow();
        match &self.sender {
            Some(sender) if !self.workers.is_empty() => {
                if let Err(SendError(job)) = sender.send(job) {
                    job();
                }
            }
            _ => job(),
        }
        self.pending.push((seq, replies));
    }

    /// Waits for every task. A panicking task is logged and counted, never
    /// propagated.
    pub fn join(self) -> Joined {
        let Self {
            kind,
            sender,
            workers,
            pending,
            ..
        } = self;
        drop(sender);

        let mut joined = Joined {
            records: Vec::with_capacity(pending.len()),
            failed: 0,
        };
        for (seq, replies) in pending {
            let id = kind.synthetic_id(seq);
            match replies.recv() {
                Ok(Ok(Some(record))) => joined.records.push(record),
                Ok(Ok(None)) => debug!(id = %id, "Parse task returned no record"),
                Ok(Err(panic)) => {
                    let msg = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    error!(id = %id, "Parse task panicked: {}", msg);
                    joined.failed += 1;
                }
                Err(_) => {
                    error!(id = %id, "Parse task never reported back");
                    joined.failed += 1;
                }
            }
        }

        for worker in workers {
            if worker.join().is_err() {
                error!(kind = %kind, "Parse worker panicked");
            }
        }
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LightCone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<ProgressEvent>>);

    impl ProgressSink for Recorder {
        fn report(&self, event: ProgressEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn light_cone(seq: u32) -> Option<ParsedRecord> {
        Some(ParsedRecord::LightCone(LightCone {
            key: "Void".to_string(),
            level: 1,
            ascension: 0,
            superimposition: 1,
            location: String::new(),
            lock: false,
            id: RecordKind::LightCone.synthetic_id(seq),
        }))
    }

    #[test]
    fn test_join_collects_records_in_spawn_order() {
        let sink = Arc::new(Recorder::default());
        let mut tasks = ScanTaskSet::new(RecordKind::LightCone, sink.clone());
        for seq in 1..=3 {
            tasks.spawn(seq, move || light_cone(seq));
        }
        tasks.spawn(4, || None);
        assert_eq!(tasks.sequences(), vec![1, 2, 3, 4]);

        let joined = tasks.join();
        let ids: Vec<_> = joined.records.iter().map(|r| r.id().to_string()).collect();
        assert_eq!(ids, vec!["light_cone_1", "light_cone_2", "light_cone_3"]);
        assert_eq!(joined.failed, 0);

        let events = sink.0.lock().unwrap();
        let queued = events.iter().filter(|e| matches!(e, ProgressEvent::Queued(_))).count();
        let parsed = events.iter().filter(|e| matches!(e, ProgressEvent::Parsed(_))).count();
        assert_eq!((queued, parsed), (4, 3));
    }

    #[test]
    fn test_panicking_task_is_counted_not_propagated() {
        let mut tasks = ScanTaskSet::new(RecordKind::LightCone, Arc::new(Recorder::default()));
        tasks.spawn(1, || light_cone(1));
        tasks.spawn(2, || panic!("bad capture"));
        tasks.spawn(3, || light_cone(3));

        let joined = tasks.join();
        assert_eq!(joined.records.len(), 2);
        assert_eq!(joined.failed, 1);
    }

    #[test]
    fn test_parses_never_exceed_worker_count() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut tasks = ScanTaskSet::with_workers(RecordKind::LightCone, Arc::new(Recorder::default()), 2);
        for seq in 1..=20 {
            let running = running.clone();
            let peak = peak.clone();
            tasks.spawn(seq, move || {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(5));
                running.fetch_sub(1, Ordering::SeqCst);
                light_cone(seq)
            });
        }
        assert!(tasks.workers.len() <= 2);

        let joined = tasks.join();
        assert_eq!(joined.records.len(), 20);
        assert_eq!(joined.records[19].id(), "light_cone_20");
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
