// Batch: an insertion-ordered sequence of requests plus the owned-buffer
// bookkeeping needed by dump/load.
//
// Austin Shafer - 2020

use std::path::Path;

use thiserror::Error;

use crate::types::{Action, Request};

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("(de)serialization error: {0}")]
    Serde(#[from] bincode::Error),
    #[error("batch file declares version {found}, runtime expects {expected}")]
    VersionMismatch { found: u32, expected: u32 },
}

pub type Result<T> = std::result::Result<T, BatchError>;

/// An ordered collection of requests, the unit of commit to the
/// [`crate::requester::Requester`] (glossary: Batch).
///
/// `owned` holds heap buffers this batch is responsible for freeing: in
/// this Rust port that's only really meaningful for buffers restored by
/// [`Batch::load`], since every other buffer already has Rust-native
/// ownership (`Vec<u8>` inside `Payload::UploadDat` etc.) - kept anyway to
/// mirror the C original's ownership-list shape closely, and because a
/// future non-deep-copy (`NOCOPY`) helper could stash a raw buffer here.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    requests: Vec<Request>,
    owned: Vec<Vec<u8>>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, request: Request) {
        self.requests.push(request);
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    pub fn requests_mut(&mut self) -> &mut Vec<Request> {
        &mut self.requests
    }

    pub fn clear(&mut self) {
        self.requests.clear();
        self.owned.clear();
    }

    /// Copy this batch's request array into a fresh `Batch`. Per §3: "a
    /// batch may be copied; the copy allocates fresh storage for the
    /// request array and does not inherit the ownership list."
    pub fn shallow_copy(&self) -> Batch {
        Batch {
            requests: self.requests.clone(),
            owned: Vec::new(),
        }
    }

    /// Dump this batch to disk as a two-tier artifact (§4.D.3): a main
    /// file holding the request array, and one zero-padded `.NNN` sidecar
    /// per UPLOAD request (in encounter order, counter starting at 1) that
    /// holds that request's raw upload payload.
    pub fn dump(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = bincode::serialize(&self.requests)?;
        std::fs::write(path, bytes)?;

        let mut sidecar_idx = 1u32;
        for req in &self.requests {
            if req.action != Action::Upload {
                continue;
            }
            let data = upload_payload_bytes(req);
            if let Some(data) = data {
                let sidecar = sidecar_path(path, sidecar_idx);
                std::fs::write(sidecar, data)?;
                sidecar_idx += 1;
            }
        }
        Ok(())
    }

    /// Load a batch previously written by [`Batch::dump`]. Restored
    /// upload buffers are pulled from their sidecar files, in request
    /// order, and recorded in this batch's owned-pointers list.
    pub fn load(path: impl AsRef<Path>) -> Result<Batch> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let mut requests: Vec<Request> = bincode::deserialize(&bytes)?;

        for req in &requests {
            if req.version != crate::types::CURRENT_VERSION {
                return Err(BatchError::VersionMismatch {
                    found: req.version,
                    expected: crate::types::CURRENT_VERSION,
                });
            }
        }

        let mut batch = Batch::new();
        let mut sidecar_idx = 1u32;
        for req in requests.iter_mut() {
            if req.action != Action::Upload {
                continue;
            }
            let sidecar = sidecar_path(path, sidecar_idx);
            if sidecar.exists() {
                let data = std::fs::read(&sidecar)?;
                replace_upload_payload_bytes(req, data.clone());
                batch.owned.push(data);
            }
            sidecar_idx += 1;
        }
        batch.requests = requests;
        Ok(batch)
    }

    pub fn owned_buffers(&self) -> &[Vec<u8>] {
        &self.owned
    }
}

fn sidecar_path(main: &Path, idx: u32) -> std::path::PathBuf {
    let mut name = main.as_os_str().to_owned();
    name.push(format!(".{:03}", idx));
    std::path::PathBuf::from(name)
}

fn upload_payload_bytes(req: &Request) -> Option<&[u8]> {
    use crate::types::Payload;
    match &req.content {
        Payload::UploadDat { data, .. } => Some(data),
        Payload::UploadTex { data, .. } => Some(data),
        _ => None,
    }
}

fn replace_upload_payload_bytes(req: &mut Request, data: Vec<u8>) {
    use crate::types::Payload;
    match &mut req.content {
        Payload::UploadDat { data: d, .. } => *d = data,
        Payload::UploadTex { data: d, .. } => *d = data,
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Action, ObjectType, Payload, Request};

    fn upload_request(id: u64, bytes: &[u8]) -> Request {
        Request::new(
            Action::Upload,
            ObjectType::Dat,
            id,
            Payload::UploadDat {
                offset: 0,
                size: bytes.len() as u64,
                data: bytes.to_vec(),
            },
        )
    }

    #[test]
    fn dump_then_load_round_trips_requests_and_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.bin");

        let mut batch = Batch::new();
        batch.push(Request::new(
            Action::Create,
            ObjectType::Canvas,
            1,
            Payload::CreateCanvas {
                width: 800,
                height: 600,
            },
        ));
        batch.push(upload_request(2, &[1, 2, 3, 4]));
        batch.push(upload_request(3, &[9, 9]));

        batch.dump(&path).unwrap();
        assert!(dir.path().join("batch.bin.001").exists());
        assert!(dir.path().join("batch.bin.002").exists());

        let loaded = Batch::load(&path).unwrap();
        assert_eq!(loaded.len(), batch.len());
        assert_eq!(loaded.owned_buffers().len(), 2);
        match &loaded.requests()[1].content {
            Payload::UploadDat { data, .. } => assert_eq!(data, &[1, 2, 3, 4]),
            _ => panic!("wrong payload"),
        }
    }

    #[test]
    fn shallow_copy_has_fresh_storage_and_no_owned_list() {
        let mut batch = Batch::new();
        batch.push(upload_request(1, &[1, 2]));
        let copy = batch.shallow_copy();
        assert_eq!(copy.len(), 1);
        assert!(copy.owned_buffers().is_empty());
    }

    #[test]
    fn load_rejects_mismatched_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.bin");
        let mut req = Request::new(Action::Create, ObjectType::Canvas, 1, Payload::CreateCanvas { width: 1, height: 1 });
        req.version = 9999;
        let bytes = bincode::serialize(&vec![req]).unwrap();
        std::fs::write(&path, bytes).unwrap();
        assert!(Batch::load(&path).is_err());
    }
}
