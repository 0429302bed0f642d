use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{bounded, never, tick, unbounded, Receiver, Sender, TryRecvError};
use crossbeam::select;
use mongodb::bson::{self, Bson, DateTime, Document};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{DocumentStore, MESSAGE_COLLECTION, RUN_COLLECTION};
use crate::config::HiveSpec;
use crate::event::EventConsumer;
use crate::machine::MachineMeta;
use crate::message::HiveMessage;

/// Cadence of bulk writes.
pub const STORE_INTERVAL: Duration = Duration::from_secs(1);
/// How long a requested flush keeps retrying before completing best-effort.
pub const MAX_FLUSH_GRACE: Duration = Duration::from_secs(5);
/// Cap on documents per bulk insert.
pub const MAX_PER_REQUEST: usize = 200;

/// A message awaiting persistence, stamped at ingestion.
struct Pending {
    temp_id: Uuid,
    time: DateTime,
    message: HiveMessage,
}

enum FlushState {
    Idle,
    Pending { done: Sender<()>, deadline: Instant },
    Done,
}

struct FlushRequest {
    done: Sender<()>,
}

/// Consumes the event pipeline and persists messages in periodic batches.
/// `holding` accumulates ingested messages; `writing` tracks the temp ids
/// of the batch currently in flight. Lock order is `writing` before
/// `holding`, and `holding` is never held across store I/O.
pub struct MessageBatcher<S: DocumentStore> {
    store: S,
    spec: HiveSpec,
    machine: MachineMeta,
    holding: Mutex<Vec<Pending>>,
    writing: Mutex<Vec<Uuid>>,
    run_id: Option<Bson>,
    interval: Duration,
    flush_grace: Duration,
    max_per_request: usize,
}

impl<S: DocumentStore> MessageBatcher<S> {
    pub fn new(store: S, spec: HiveSpec, machine: MachineMeta) -> Self {
        Self {
            store,
            spec,
            machine,
            holding: Mutex::new(Vec::new()),
            writing: Mutex::new(Vec::new()),
            run_id: None,
            interval: STORE_INTERVAL,
            flush_grace: MAX_FLUSH_GRACE,
            max_per_request: MAX_PER_REQUEST,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_flush_grace(mut self, flush_grace: Duration) -> Self {
        self.flush_grace = flush_grace;
        self
    }

    pub fn with_max_per_request(mut self, max_per_request: usize) -> Self {
        self.max_per_request = max_per_request;
        self
    }

    /// Spawns the batcher thread. It registers the run document, then
    /// alternates between ingesting messages and flushing batches until the
    /// pipeline closes and a requested flush has completed.
    pub fn start(self, messages: EventConsumer<HiveMessage>) -> std::io::Result<BatcherHandle> {
        let (flush_tx, flush_rx) = unbounded::<FlushRequest>();
        let completion_wait = self.flush_grace + 2 * self.interval;

        let thread = thread::Builder::new()
            .name("batcher".to_string())
            .spawn(move || self.run(messages, flush_rx))?;

        Ok(BatcherHandle {
            thread,
            flush_tx,
            completion_wait,
        })
    }

    fn run(mut self, messages: EventConsumer<HiveMessage>, flush_rx: Receiver<FlushRequest>) {
        self.insert_run();

        let ticker = tick(self.interval);
        let closed_messages: Receiver<HiveMessage> = never();
        let closed_flush: Receiver<FlushRequest> = never();
        let mut messages_open = true;
        let mut flush_open = true;
        let mut flush = FlushState::Idle;

        loop {
            if matches!(flush, FlushState::Done) && !messages_open {
                return;
            }

            // Drain whatever is already queued so a pending flush can never
            // complete ahead of messages emitted before it was requested.
            while messages_open {
                match messages.as_ref().try_recv() {
                    Ok(message) => self.ingest(message),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => messages_open = false,
                }
            }

            let inbound = if messages_open {
                messages.as_ref()
            } else {
                &closed_messages
            };
            let flush_requests = if flush_open { &flush_rx } else { &closed_flush };

            select! {
                recv(inbound) -> message => match message {
                    Ok(message) => self.ingest(message),
                    Err(_) => messages_open = false,
                },
                recv(flush_requests) -> request => match request {
                    Ok(request) => {
                        debug!("flush requested, draining pending messages");
                        flush = FlushState::Pending {
                            done: request.done,
                            deadline: Instant::now() + self.flush_grace,
                        };
                    }
                    Err(_) => flush_open = false,
                },
                recv(ticker) -> _ => self.tick(&mut flush),
            }
        }
    }

    /// Ingestion path: stamp the time, assign a temp id, append.
    fn ingest(&self, message: HiveMessage) {
        let pending = Pending {
            temp_id: Uuid::new_v4(),
            time: DateTime::now(),
            message,
        };
        self.holding.lock().unwrap().push(pending);
    }

    /// One batching round: write the oldest batch if anything is pending,
    /// then settle a requested flush.
    fn tick(&self, flush: &mut FlushState) {
        if !self.holding.lock().unwrap().is_empty() {
            self.write_batch();
        }
        self.try_complete_flush(flush);
    }

    fn write_batch(&self) {
        let mut writing = self.writing.lock().unwrap();
        let documents: Vec<Document> = {
            let holding = self.holding.lock().unwrap();
            let batch = &holding[..holding.len().min(self.max_per_request)];
            writing.extend(batch.iter().map(|pending| pending.temp_id));
            batch
                .iter()
                .filter_map(|pending| match self.message_document(pending) {
                    Ok(document) => Some(document),
                    Err(err) => {
                        error!("cannot serialize message, dropping it: {err}");
                        None
                    }
                })
                .collect()
        };
        // holding is released; the bulk insert may block

        if documents.is_empty() {
            // every document in the batch failed to serialize; drop them
            let mut holding = self.holding.lock().unwrap();
            holding.retain(|pending| !writing.contains(&pending.temp_id));
            writing.clear();
            return;
        }

        match self.store.insert_many(MESSAGE_COLLECTION, documents) {
            Ok(ids) => {
                debug!(count = ids.len(), "persisted message batch");
                let mut holding = self.holding.lock().unwrap();
                holding.retain(|pending| !writing.contains(&pending.temp_id));
            }
            Err(err) => {
                error!("cannot persist message batch, keeping it for retry: {err}");
            }
        }
        writing.clear();
    }

    fn try_complete_flush(&self, flush: &mut FlushState) {
        let FlushState::Pending { deadline, .. } = flush else {
            return;
        };

        let residual = self.holding.lock().unwrap().len();
        if residual > 0 && Instant::now() < *deadline {
            return; // keep draining within the grace period
        }
        if residual > 0 {
            warn!(
                residual,
                "flush grace elapsed, completing with unpersisted messages"
            );
        }
        if let FlushState::Pending { done, .. } = std::mem::replace(flush, FlushState::Done) {
            // one-shot: the requester may already have given up waiting
            let _ = done.send(());
        }
        info!("flush complete");
    }

    /// Registers the run document and keeps its id for message enrichment.
    /// Failure is logged; messages then carry a null run id.
    fn insert_run(&mut self) {
        let document = match self.run_document() {
            Ok(document) => document,
            Err(err) => {
                error!("cannot serialize hive run document: {err}");
                return;
            }
        };
        match self.store.insert_one(RUN_COLLECTION, document) {
            Ok(id) => {
                info!(run_id = %id, "registered hive run");
                self.run_id = Some(id);
            }
            Err(err) => {
                error!("cannot register hive run, messages will carry a null run id: {err}");
            }
        }
    }

    fn run_document(&self) -> Result<Document, bson::ser::Error> {
        let mut document = bson::to_document(&self.spec)?;
        document.insert("time", DateTime::now());
        document.insert("runtimeMachine", bson::to_bson(&self.machine)?);
        Ok(document)
    }

    fn message_document(&self, pending: &Pending) -> Result<Document, bson::ser::Error> {
        let mut document = bson::to_document(&pending.message)?;
        document.insert("hiveRunId", self.run_id.clone().unwrap_or(Bson::Null));
        document.insert("runtimeMachine", bson::to_bson(&self.machine)?);
        document.insert("time", pending.time);
        Ok(document)
    }
}

/// Handle to a running batcher: the one-shot flush protocol and the final
/// join.
pub struct BatcherHandle {
    thread: JoinHandle<()>,
    flush_tx: Sender<FlushRequest>,
    completion_wait: Duration,
}

impl BatcherHandle {
    /// Requests a drain of everything pending and blocks until the batcher
    /// reports completion. Returns false when the completion signal does
    /// not arrive within the grace window plus scheduling margin.
    pub fn flush(&self) -> bool {
        let (done_tx, done_rx) = bounded(1);
        if self.flush_tx.send(FlushRequest { done: done_tx }).is_err() {
            return false;
        }
        done_rx.recv_timeout(self.completion_wait).is_ok()
    }

    pub fn join(self) {
        if self.thread.join().is_err() {
            error!("batcher thread panicked");
        }
    }
}
