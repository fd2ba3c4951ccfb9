// Requester: a thread-safe FIFO of committed batches (§4.E).
//
// Austin Shafer - 2020

use dvz_fifo::Fifo;
use utils::log;

use crate::batch::Batch;

const REQUESTER_QUEUE_CAPACITY: usize = 256;

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v != "0" && !v.is_empty())
        .unwrap_or(false)
}

fn env_dump_filename() -> String {
    std::env::var("DVZ_DUMP_FILENAME").unwrap_or_else(|_| "dvz_dump.bin".to_string())
}

/// A thread-safe FIFO of committed batches. `commit` enqueues a shallow
/// copy of the given batch (shares the request array, owns no buffers of
/// its own - see [`Batch::shallow_copy`]); `flush` drains everything
/// currently queued.
pub struct Requester {
    fifo: Fifo<Batch>,
}

impl Requester {
    pub fn new() -> Self {
        Self {
            fifo: Fifo::new(REQUESTER_QUEUE_CAPACITY).expect("static capacity is always valid"),
        }
    }

    /// Push a shallow copy of `batch` onto the FIFO.
    pub fn commit(&self, batch: &Batch) {
        self.fifo.enqueue(batch.shallow_copy());
    }

    /// Drain every batch currently queued, in commit order. When
    /// `DVZ_DUMP=1` (§6), each flushed batch is additionally dumped to
    /// `DVZ_DUMP_FILENAME` (default `dvz_dump.bin`) before being returned.
    pub fn flush(&self) -> Vec<Batch> {
        let mut out = Vec::new();
        while let Some(batch) = self.fifo.dequeue(false) {
            out.push(batch);
        }

        if env_flag("DVZ_DUMP") {
            let filename = env_dump_filename();
            for (i, batch) in out.iter().enumerate() {
                let path = if out.len() == 1 {
                    filename.clone()
                } else {
                    format!("{}.{}", filename, i)
                };
                if let Err(e) = batch.dump(&path) {
                    log::error!("failed to dump batch to {}: {}", path, e);
                }
            }
        }

        out
    }

    pub fn pending(&self) -> usize {
        self.fifo.size()
    }
}

impl Default for Requester {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Action, ObjectType, Payload, Request};

    #[test]
    fn commit_then_flush_preserves_order() {
        let requester = Requester::new();
        let mut b1 = Batch::new();
        b1.push(Request::new(
            Action::Create,
            ObjectType::Canvas,
            1,
            Payload::CreateCanvas {
                width: 1,
                height: 1,
            },
        ));
        let mut b2 = Batch::new();
        b2.push(Request::new(
            Action::Create,
            ObjectType::Canvas,
            2,
            Payload::CreateCanvas {
                width: 2,
                height: 2,
            },
        ));

        requester.commit(&b1);
        requester.commit(&b2);
        assert_eq!(requester.pending(), 2);

        let flushed = requester.flush();
        assert_eq!(flushed.len(), 2);
        assert_eq!(flushed[0].requests()[0].id, 1);
        assert_eq!(flushed[1].requests()[0].id, 2);
        assert_eq!(requester.pending(), 0);
    }

    #[test]
    fn commit_shares_request_array_but_not_ownership_list() {
        let requester = Requester::new();
        let mut b = Batch::new();
        b.push(Request::new(
            Action::Upload,
            ObjectType::Dat,
            1,
            Payload::UploadDat {
                offset: 0,
                size: 2,
                data: vec![1, 2],
            },
        ));
        requester.commit(&b);
        let flushed = requester.flush();
        assert_eq!(flushed[0].len(), 1);
        assert!(flushed[0].owned_buffers().is_empty());
    }
}
