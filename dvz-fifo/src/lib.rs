// Thread-safe bounded FIFO and multi-queue "Deq" dequeue scheduler
//
// Rust analogue of Datoviz's `_fifo.h`/`_fifo.c`: a single bounded ring
// buffer of items (`Fifo<T>`), and a named bundle of up to
// `DEQ_MAX_QUEUES` such FIFOs partitioned into up to `DEQ_MAX_PROCS` procs,
// each proc consumed by one OS thread in a condvar-driven dequeue loop
// (`Deq<T>`). `VecDeque<T>` behind a `Mutex`+`Condvar` replaces the C's
// hand-rolled ring buffer + pthread primitives; no unsafe is needed here,
// safe stdlib concurrency primitives cover this cleanly.
//
// Austin Shafer - 2020

#[cfg(test)]
mod tests;

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use thiserror::Error;

/// Default/maximum bounded capacity for a single `Fifo`, matching
/// `DVZ_MAX_FIFO_CAPACITY` in the original C headers.
pub const MAX_FIFO_CAPACITY: usize = 256;
/// Maximum number of FIFOs a single `Deq` may bundle.
pub const DEQ_MAX_QUEUES: usize = 8;
/// Maximum number of queues a single proc may own.
pub const DEQ_MAX_PROC_SIZE: usize = 4;
/// Maximum number of procs a single `Deq` may have.
pub const DEQ_MAX_PROCS: usize = 4;
/// Maximum number of registered item callbacks per proc.
pub const DEQ_MAX_CALLBACKS: usize = 32;

#[derive(Debug, Error)]
pub enum FifoError {
    #[error("fifo capacity {0} exceeds MAX_FIFO_CAPACITY ({MAX_FIFO_CAPACITY})")]
    CapacityTooLarge(usize),
    #[error("deq cannot hold more than {DEQ_MAX_QUEUES} queues")]
    TooManyQueues,
    #[error("deq cannot hold more than {DEQ_MAX_PROCS} procs")]
    TooManyProcs,
    #[error("proc cannot own more than {DEQ_MAX_PROC_SIZE} queues")]
    ProcTooLarge,
    #[error("queue index {0} is out of range")]
    BadQueueIndex(usize),
    #[error("proc index {0} is out of range")]
    BadProcIndex(usize),
}

pub type Result<T> = std::result::Result<T, FifoError>;

struct Shared<T> {
    queue: Mutex<VecDeque<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

/// A thread-safe bounded FIFO of `T`. Multi-producer / single-consumer:
/// any number of threads may `enqueue`, but ordering is only guaranteed
/// within a single producer's own call sequence.
#[derive(Clone)]
pub struct Fifo<T> {
    inner: Arc<Shared<T>>,
}

impl<T> Fifo<T> {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 || capacity > MAX_FIFO_CAPACITY {
            return Err(FifoError::CapacityTooLarge(capacity));
        }
        Ok(Self {
            inner: Arc::new(Shared {
                queue: Mutex::new(VecDeque::with_capacity(capacity)),
                not_empty: Condvar::new(),
                not_full: Condvar::new(),
                capacity,
            }),
        })
    }

    /// Push `item` to the back of the queue, blocking on a condition
    /// variable while the queue is full.
    pub fn enqueue(&self, item: T) {
        let mut q = self.inner.queue.lock().unwrap();
        while q.len() >= self.inner.capacity {
            q = self.inner.not_full.wait(q).unwrap();
        }
        q.push_back(item);
        drop(q);
        self.inner.not_empty.notify_one();
    }

    /// Push `item` to the *front* of the queue (LIFO-style priority
    /// insertion), blocking while full.
    pub fn enqueue_first(&self, item: T) {
        let mut q = self.inner.queue.lock().unwrap();
        while q.len() >= self.inner.capacity {
            q = self.inner.not_full.wait(q).unwrap();
        }
        q.push_front(item);
        drop(q);
        self.inner.not_empty.notify_one();
    }

    /// Pop the item at the front of the queue. If `wait` is true, blocks
    /// until an item is available; otherwise returns `None` immediately
    /// when the queue is empty.
    pub fn dequeue(&self, wait: bool) -> Option<T> {
        let mut q = self.inner.queue.lock().unwrap();
        if wait {
            while q.is_empty() {
                q = self.inner.not_empty.wait(q).unwrap();
            }
        } else if q.is_empty() {
            return None;
        }
        let item = q.pop_front();
        drop(q);
        self.inner.not_full.notify_one();
        item
    }

    /// Like [`Fifo::dequeue`] with `wait = true`, but gives up after
    /// `timeout` and returns `None`. Used by the Deq's proc loop to wake
    /// periodically and fire `wait` callbacks.
    pub fn dequeue_timeout(&self, timeout: Duration) -> Option<T> {
        let mut q = self.inner.queue.lock().unwrap();
        loop {
            if let Some(item) = q.pop_front() {
                drop(q);
                self.inner.not_full.notify_one();
                return Some(item);
            }
            let (guard, result) = self.inner.not_empty.wait_timeout(q, timeout).unwrap();
            q = guard;
            if result.timed_out() && q.is_empty() {
                return None;
            }
        }
    }

    pub fn size(&self) -> usize {
        self.inner.queue.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Discard all but the most recent `max_size` elements.
    pub fn discard(&self, max_size: usize) {
        let mut q = self.inner.queue.lock().unwrap();
        let excess = q.len().saturating_sub(max_size);
        for _ in 0..excess {
            q.pop_front();
        }
        drop(q);
        self.inner.not_full.notify_all();
    }

    pub fn reset(&self) {
        let mut q = self.inner.queue.lock().unwrap();
        q.clear();
        drop(q);
        self.inner.not_full.notify_all();
    }

    /// No explicit teardown is needed beyond `Drop`; kept for API parity
    /// with the C `dvz_fifo_destroy` entry point.
    pub fn destroy(self) {
        self.reset();
    }
}

/// Dequeue ordering strategy for a `Deq` proc with more than one queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Rotate across the proc's queues, servicing each in turn.
    BreadthFirst,
    /// Fully drain queue 0 before moving to queue 1, etc.
    DepthFirst,
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::BreadthFirst
    }
}

/// One item dequeued from a `Deq`. Carries an application-defined `item_type`
/// used to pick a callback, and an optional list of follow-up items to
/// enqueue once this item's callbacks have run ("do A; when A completes
/// enqueue B").
pub struct DeqItem<T> {
    pub item_type: u32,
    pub payload: T,
    /// Follow-up items and whether each should be enqueued at the front
    /// (`true`) or back (`false`) of its target queue.
    pub next: Vec<(usize, DeqItem<T>, bool)>,
}

impl<T> DeqItem<T> {
    pub fn new(item_type: u32, payload: T) -> Self {
        Self {
            item_type,
            payload,
            next: Vec::new(),
        }
    }

    pub fn with_next(mut self, queue_idx: usize, item: DeqItem<T>, enqueue_first: bool) -> Self {
        self.next.push((queue_idx, item, enqueue_first));
        self
    }
}

/// An empty item enqueued to a proc's queue 0 to terminate its
/// `dequeue_loop`. `Deq::stop` constructs one of these with `item_type =
/// u32::MAX` by convention.
pub const STOP_ITEM_TYPE: u32 = u32::MAX;

type ItemCallback<T> = Box<dyn Fn(&DeqItem<T>) + Send + Sync>;
type ProcCallback<T> = Box<dyn Fn(&DeqItem<T>) + Send + Sync>;
type WaitCallback = Box<dyn Fn() + Send + Sync>;
type BatchCallback = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct ProcCallbacks<T> {
    /// Keyed by `(queue_idx, item_type)`.
    items: Vec<((usize, u32), ItemCallback<T>)>,
    default_cb: Option<ProcCallback<T>>,
    pre: Option<ProcCallback<T>>,
    post: Option<ProcCallback<T>>,
    wait: Option<WaitCallback>,
    batch_begin: Option<BatchCallback>,
    batch_end: Option<BatchCallback>,
}

struct Proc<T> {
    queue_indices: Vec<usize>,
    strategy: Strategy,
    queue_offset: std::sync::atomic::AtomicUsize,
    callbacks: Mutex<ProcCallbacks<T>>,
}

/// A named bundle of up to [`DEQ_MAX_QUEUES`] FIFOs, partitioned into up to
/// [`DEQ_MAX_PROCS`] procs. Each proc is meant to be drained by exactly one
/// thread via [`Deq::dequeue_loop`].
pub struct Deq<T> {
    queues: Vec<Fifo<DeqItem<T>>>,
    procs: Vec<Proc<T>>,
}

impl<T: Send + 'static> Deq<T> {
    pub fn new() -> Self {
        Self {
            queues: Vec::new(),
            procs: Vec::new(),
        }
    }

    /// Add a new queue to the bundle, returning its index.
    pub fn add_queue(&mut self, capacity: usize) -> Result<usize> {
        if self.queues.len() >= DEQ_MAX_QUEUES {
            return Err(FifoError::TooManyQueues);
        }
        self.queues.push(Fifo::new(capacity)?);
        Ok(self.queues.len() - 1)
    }

    /// Add a new proc owning `queue_indices` (1-4 of this `Deq`'s queues).
    pub fn add_proc(&mut self, queue_indices: Vec<usize>, strategy: Strategy) -> Result<usize> {
        if self.procs.len() >= DEQ_MAX_PROCS {
            return Err(FifoError::TooManyProcs);
        }
        if queue_indices.is_empty() || queue_indices.len() > DEQ_MAX_PROC_SIZE {
            return Err(FifoError::ProcTooLarge);
        }
        for &qi in &queue_indices {
            if qi >= self.queues.len() {
                return Err(FifoError::BadQueueIndex(qi));
            }
        }
        self.procs.push(Proc {
            queue_indices,
            strategy,
            queue_offset: std::sync::atomic::AtomicUsize::new(0),
            callbacks: Mutex::new(ProcCallbacks::default()),
        });
        Ok(self.procs.len() - 1)
    }

    fn proc(&self, proc_idx: usize) -> Result<&Proc<T>> {
        self.procs
            .get(proc_idx)
            .ok_or(FifoError::BadProcIndex(proc_idx))
    }

    pub fn enqueue(&self, queue_idx: usize, item: DeqItem<T>) -> Result<()> {
        self.queues
            .get(queue_idx)
            .ok_or(FifoError::BadQueueIndex(queue_idx))?
            .enqueue(item);
        Ok(())
    }

    pub fn enqueue_first(&self, queue_idx: usize, item: DeqItem<T>) -> Result<()> {
        self.queues
            .get(queue_idx)
            .ok_or(FifoError::BadQueueIndex(queue_idx))?
            .enqueue_first(item);
        Ok(())
    }

    pub fn on_item<F>(&self, proc_idx: usize, queue_idx: usize, item_type: u32, cb: F) -> Result<()>
    where
        F: Fn(&DeqItem<T>) + Send + Sync + 'static,
    {
        let p = self.proc(proc_idx)?;
        let mut cbs = p.callbacks.lock().unwrap();
        if cbs.items.len() >= DEQ_MAX_CALLBACKS {
            return Err(FifoError::ProcTooLarge);
        }
        cbs.items.push(((queue_idx, item_type), Box::new(cb)));
        Ok(())
    }

    pub fn on_default<F>(&self, proc_idx: usize, cb: F) -> Result<()>
    where
        F: Fn(&DeqItem<T>) + Send + Sync + 'static,
    {
        self.proc(proc_idx)?.callbacks.lock().unwrap().default_cb = Some(Box::new(cb));
        Ok(())
    }

    pub fn on_pre<F>(&self, proc_idx: usize, cb: F) -> Result<()>
    where
        F: Fn(&DeqItem<T>) + Send + Sync + 'static,
    {
        self.proc(proc_idx)?.callbacks.lock().unwrap().pre = Some(Box::new(cb));
        Ok(())
    }

    pub fn on_post<F>(&self, proc_idx: usize, cb: F) -> Result<()>
    where
        F: Fn(&DeqItem<T>) + Send + Sync + 'static,
    {
        self.proc(proc_idx)?.callbacks.lock().unwrap().post = Some(Box::new(cb));
        Ok(())
    }

    pub fn on_wait<F>(&self, proc_idx: usize, cb: F) -> Result<()>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.proc(proc_idx)?.callbacks.lock().unwrap().wait = Some(Box::new(cb));
        Ok(())
    }

    pub fn on_batch_begin<F>(&self, proc_idx: usize, cb: F) -> Result<()>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.proc(proc_idx)?.callbacks.lock().unwrap().batch_begin = Some(Box::new(cb));
        Ok(())
    }

    pub fn on_batch_end<F>(&self, proc_idx: usize, cb: F) -> Result<()>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.proc(proc_idx)?.callbacks.lock().unwrap().batch_end = Some(Box::new(cb));
        Ok(())
    }

    /// Pick the next queue to poll for `proc_idx`, rotating or draining
    /// per its configured [`Strategy`], and try a non-blocking dequeue
    /// from it. Returns `(queue_idx, item)` on success.
    fn try_dequeue_once(&self, proc_idx: usize) -> Option<(usize, DeqItem<T>)> {
        let p = &self.procs[proc_idx];
        let n = p.queue_indices.len();
        match p.strategy {
            Strategy::BreadthFirst => {
                let start = p.queue_offset.fetch_add(1, std::sync::atomic::Ordering::SeqCst) % n;
                for step in 0..n {
                    let idx = (start + step) % n;
                    let qi = p.queue_indices[idx];
                    if let Some(item) = self.queues[qi].dequeue(false) {
                        return Some((qi, item));
                    }
                }
                None
            }
            Strategy::DepthFirst => {
                for &qi in &p.queue_indices {
                    if let Some(item) = self.queues[qi].dequeue(false) {
                        return Some((qi, item));
                    }
                }
                None
            }
        }
    }

    fn invoke_item_callback(&self, proc_idx: usize, queue_idx: usize, item: &DeqItem<T>) {
        let p = &self.procs[proc_idx];
        let cbs = p.callbacks.lock().unwrap();
        if let Some(pre) = &cbs.pre {
            pre(item);
        }
        let matched = cbs
            .items
            .iter()
            .find(|((qi, ty), _)| *qi == queue_idx && *ty == item.item_type)
            .map(|(_, cb)| cb);
        if let Some(cb) = matched {
            cb(item);
        } else if let Some(default_cb) = &cbs.default_cb {
            default_cb(item);
        }
        if let Some(post) = &cbs.post {
            post(item);
        }
    }

    /// Run one iteration of `proc_idx`'s dequeue loop: block (up to
    /// `max_wait`) for the next item across its queues in strategy order,
    /// invoke callbacks, and enqueue any `next` follow-up items. Returns
    /// `false` once the [`STOP_ITEM_TYPE`] sentinel is seen, signalling the
    /// caller to stop looping.
    pub fn dequeue_loop_step(&self, proc_idx: usize, max_wait: Duration) -> Result<bool> {
        let _ = self.proc(proc_idx)?;
        loop {
            if let Some((queue_idx, item)) = self.try_dequeue_once(proc_idx) {
                if item.item_type == STOP_ITEM_TYPE {
                    return Ok(false);
                }
                self.invoke_item_callback(proc_idx, queue_idx, &item);
                for (next_queue, next_item, enqueue_first) in item.next {
                    if enqueue_first {
                        self.enqueue_first(next_queue, next_item)?;
                    } else {
                        self.enqueue(next_queue, next_item)?;
                    }
                }
                return Ok(true);
            }

            // Nothing ready on any owned queue; block on the first queue
            // with a timeout so the wait callback can fire periodically
            // (this models the proc's condition variable wait with timed
            // wakeups used to drive timers).
            let p = &self.procs[proc_idx];
            let first_q = p.queue_indices[0];
            if let Some(item) = self.queues[first_q].dequeue_timeout(max_wait) {
                if item.item_type == STOP_ITEM_TYPE {
                    return Ok(false);
                }
                self.invoke_item_callback(proc_idx, first_q, &item);
                for (next_queue, next_item, enqueue_first) in item.next {
                    if enqueue_first {
                        self.enqueue_first(next_queue, next_item)?;
                    } else {
                        self.enqueue(next_queue, next_item)?;
                    }
                }
                return Ok(true);
            } else {
                let cbs = p.callbacks.lock().unwrap();
                if let Some(wait_cb) = &cbs.wait {
                    wait_cb();
                }
            }
        }
    }

    /// Dequeue and process every item currently available across
    /// `proc_idx`'s queues (a "batch"), bracketed by its `batch_begin`/
    /// `batch_end` callbacks. Does not block for new arrivals.
    pub fn dequeue_batch(&self, proc_idx: usize) -> Result<usize> {
        let p = self.proc(proc_idx)?;
        {
            let cbs = p.callbacks.lock().unwrap();
            if let Some(begin) = &cbs.batch_begin {
                begin();
            }
        }
        let mut count = 0;
        while let Some((queue_idx, item)) = self.try_dequeue_once(proc_idx) {
            if item.item_type == STOP_ITEM_TYPE {
                break;
            }
            self.invoke_item_callback(proc_idx, queue_idx, &item);
            for (next_queue, next_item, enqueue_first) in item.next {
                if enqueue_first {
                    self.enqueue_first(next_queue, next_item)?;
                } else {
                    self.enqueue(next_queue, next_item)?;
                }
            }
            count += 1;
        }
        {
            let cbs = self.procs[proc_idx].callbacks.lock().unwrap();
            if let Some(end) = &cbs.batch_end {
                end();
            }
        }
        Ok(count)
    }

    /// Enqueue the empty-item sentinel to `queue_idx`, which causes the
    /// next `dequeue_loop_step` reading from that queue to return `Ok(false)`.
    pub fn stop(&self, queue_idx: usize) -> Result<()>
    where
        T: Default,
    {
        self.enqueue(queue_idx, DeqItem::new(STOP_ITEM_TYPE, T::default()))
    }
}

impl<T: Send + 'static> Default for Deq<T> {
    fn default() -> Self {
        Self::new()
    }
}
