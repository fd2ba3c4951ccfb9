// Frame-Stream Registry (§4.H) and Stream lifecycle (§4.I).
//
// A backend-registry of sinks plus the per-stream lifecycle state machine
// (`Created -> (AttachSink)* -> Started -> (Submit | Update)* -> Stopped`).
// Sink state and backend configuration are both opaque blobs from this
// crate's point of view (the C original passes `void*` for both); modeled
// here with `Box<dyn Any + Send>` rather than inventing a generic parameter
// per concrete sink type, since a concrete Rust type doesn't exist yet for
// something produced elsewhere (here: `dvz-video`'s `VideoEncoder`, a
// downstream crate this one must not depend on).
//
// Austin Shafer - 2020

use std::any::Any;
use std::sync::{Mutex, OnceLock};

use thiserror::Error;
use utils::log;

#[cfg(test)]
mod tests;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("sink backend '{0}' is already registered")]
    DuplicateBackend(String),
    #[error("no sink backend named '{0}' was found")]
    BackendNotFound(String),
    #[error("no registered backend probed true")]
    NoBackendAvailable,
    #[error("attach_sink called after the stream was started")]
    AlreadyStarted,
    #[error("update called before the stream was started")]
    NotStarted,
    #[error("sink backend '{0}' rejected this configuration (probe returned false)")]
    ProbeRejected(String),
    #[error("sink backend '{0}' failed to create its instance")]
    CreateFailed(String),
}

pub type Result<T> = std::result::Result<T, StreamError>;

/// The frame handed to sinks on `start`/`update`: an image plus the device
/// memory backing it and, optionally, an external (POSIX fd) timeline
/// semaphore to sequence GPU work against.
#[derive(Debug, Clone, Default)]
pub struct FrameDescriptor {
    pub image: u64,
    pub memory: u64,
    pub memory_size: u64,
    pub memory_fd: Option<i32>,
    pub wait_semaphore_fd: Option<i32>,
    pub width: u32,
    pub height: u32,
}

pub type SinkConfig = Box<dyn Any + Send + Sync>;
pub type SinkState = Box<dyn Any + Send>;

/// A sink backend descriptor (§4.H): `{ name, probe?, create?, start?,
/// submit?, stop?, update?, destroy? }`. Every callback but `name` is
/// optional; an absent callback is a no-op (`probe` absent is treated as
/// "always available").
pub struct SinkBackend {
    pub name: String,
    pub probe: Option<Box<dyn Fn(&SinkConfig) -> bool + Send + Sync>>,
    pub create: Option<Box<dyn Fn(&SinkConfig) -> Result<SinkState> + Send + Sync>>,
    pub start: Option<Box<dyn Fn(&mut SinkState, &FrameDescriptor) -> i32 + Send + Sync>>,
    pub submit: Option<Box<dyn Fn(&mut SinkState, u64) -> i32 + Send + Sync>>,
    pub stop: Option<Box<dyn Fn(&mut SinkState) + Send + Sync>>,
    pub update: Option<Box<dyn Fn(&mut SinkState, &FrameDescriptor) -> i32 + Send + Sync>>,
    pub destroy: Option<Box<dyn Fn(&mut SinkState) + Send + Sync>>,
}

impl SinkBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            probe: None,
            create: None,
            start: None,
            submit: None,
            stop: None,
            update: None,
            destroy: None,
        }
    }

    fn probes(&self, cfg: &SinkConfig) -> bool {
        match &self.probe {
            Some(f) => f(cfg),
            None => true,
        }
    }
}

/// Insertion-ordered, duplicate-name-refusing list of backends.
#[derive(Default)]
pub struct Registry {
    backends: Vec<SinkBackend>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `backend`. Refuses (returns an error, backend untouched)
    /// if a backend with the same name already exists.
    pub fn register(&mut self, backend: SinkBackend) -> Result<()> {
        if self.find(&backend.name).is_some() {
            return Err(StreamError::DuplicateBackend(backend.name));
        }
        self.backends.push(backend);
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<&SinkBackend> {
        self.backends.iter().find(|b| b.name == name)
    }

    /// Select a backend per §4.H: if `name_or_auto` names a specific,
    /// registered backend whose `probe` passes, return it; if it names one
    /// whose probe fails, warn and fall through to auto-selection; if
    /// `name_or_auto == "auto"` (or names nothing registered), iterate in
    /// registration order and return the first whose `probe` passes.
    /// Returns `None`/an error if nothing probes true.
    pub fn pick(&self, name_or_auto: &str, cfg: &SinkConfig) -> Result<&SinkBackend> {
        if name_or_auto != "auto" {
            if let Some(backend) = self.find(name_or_auto) {
                if backend.probes(cfg) {
                    return Ok(backend);
                }
                log::error!(
                    "sink backend '{}' was requested but its probe failed; falling back to auto",
                    name_or_auto
                );
            }
        }
        self.backends
            .iter()
            .find(|b| b.probes(cfg))
            .ok_or(StreamError::NoBackendAvailable)
    }
}

static DEFAULT_REGISTRY: OnceLock<Mutex<Registry>> = OnceLock::new();

/// The lazily-created process-wide shared registry.
pub fn default_registry() -> &'static Mutex<Registry> {
    DEFAULT_REGISTRY.get_or_init(|| Mutex::new(Registry::new()))
}

/// Tear down the shared registry, dropping every registered backend.
pub fn default_registry_destroy() {
    if let Some(lock) = DEFAULT_REGISTRY.get() {
        *lock.lock().unwrap() = Registry::new();
    }
}

struct AttachedSink {
    backend_name: String,
    state: SinkState,
}

/// Per-stream lifecycle state, `Stream { device, config, sinks[], started,
/// frame }` (§4.I). `device` is left to the caller (this crate doesn't
/// depend on a Vulkan binding) - callers track it alongside this struct.
pub struct Stream<'r> {
    registry: &'r Registry,
    config: SinkConfig,
    sinks: Vec<AttachedSink>,
    started: bool,
    frame: Option<FrameDescriptor>,
}

impl<'r> Stream<'r> {
    pub fn new(registry: &'r Registry, config: SinkConfig) -> Self {
        Self {
            registry,
            config,
            sinks: Vec::new(),
            started: false,
            frame: None,
        }
    }

    /// Attach a sink by backend name. Forbidden after `start`. Probes the
    /// backend against this stream's config, then calls its `create`. On
    /// failure the sink slot is not added.
    pub fn attach_sink(&mut self, backend_name: &str) -> Result<()> {
        if self.started {
            return Err(StreamError::AlreadyStarted);
        }
        let backend = self
            .registry
            .find(backend_name)
            .ok_or_else(|| StreamError::BackendNotFound(backend_name.to_string()))?;
        if !backend.probes(&self.config) {
            return Err(StreamError::ProbeRejected(backend_name.to_string()));
        }
        let state = match &backend.create {
            Some(f) => f(&self.config)?,
            None => Box::new(()) as SinkState,
        };
        self.sinks.push(AttachedSink {
            backend_name: backend_name.to_string(),
            state,
        });
        Ok(())
    }

    /// Store `frame` and call each attached sink's `start`, in attach
    /// order. On any sink failure, already-started sinks are *not*
    /// auto-stopped - the caller is expected to `destroy` the stream.
    pub fn start(&mut self, frame: FrameDescriptor) -> Result<()> {
        self.frame = Some(frame.clone());
        for sink in &mut self.sinks {
            let backend = self
                .registry
                .find(&sink.backend_name)
                .expect("attached sink's backend was removed from the registry");
            if let Some(f) = &backend.start {
                let rc = f(&mut sink.state, &frame);
                if rc != 0 {
                    log::error!(
                        "sink backend '{}' start() failed with code {}",
                        sink.backend_name,
                        rc
                    );
                }
            }
        }
        self.started = true;
        Ok(())
    }

    /// Forward to each started sink's `submit`. Returns the first non-zero
    /// code encountered, but still calls every sink.
    pub fn submit(&mut self, timeline_value: u64) -> i32 {
        let mut first_error = 0;
        for sink in &mut self.sinks {
            let backend = self
                .registry
                .find(&sink.backend_name)
                .expect("attached sink's backend was removed from the registry");
            if let Some(f) = &backend.submit {
                let rc = f(&mut sink.state, timeline_value);
                if rc != 0 && first_error == 0 {
                    first_error = rc;
                }
            }
        }
        first_error
    }

    /// Replace the current frame descriptor and propagate to each sink. A
    /// sink without `update` is restarted (`stop` then `start(new_frame)`) -
    /// §4.I / §9's conservative contract: a restart invalidates all prior
    /// sink output when no real `update` path exists.
    pub fn update(&mut self, frame: FrameDescriptor) -> Result<()> {
        if !self.started {
            return Err(StreamError::NotStarted);
        }
        for sink in &mut self.sinks {
            let backend = self
                .registry
                .find(&sink.backend_name)
                .expect("attached sink's backend was removed from the registry");
            match &backend.update {
                Some(f) => {
                    let rc = f(&mut sink.state, &frame);
                    if rc != 0 {
                        log::error!(
                            "sink backend '{}' update() failed with code {}",
                            sink.backend_name,
                            rc
                        );
                    }
                }
                None => {
                    if let Some(stop) = &backend.stop {
                        stop(&mut sink.state);
                    }
                    if let Some(start) = &backend.start {
                        start(&mut sink.state, &frame);
                    }
                }
            }
        }
        self.frame = Some(frame);
        Ok(())
    }

    /// Idempotent; calls each started sink's `stop`.
    pub fn stop(&mut self) {
        if !self.started {
            return;
        }
        for sink in &mut self.sinks {
            let backend = self
                .registry
                .find(&sink.backend_name)
                .expect("attached sink's backend was removed from the registry");
            if let Some(f) = &backend.stop {
                f(&mut sink.state);
            }
        }
        self.started = false;
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }
}

impl<'r> Drop for Stream<'r> {
    /// `destroy`: stop, then destroy each sink via its backend, drop the
    /// sink array.
    fn drop(&mut self) {
        self.stop();
        for sink in &mut self.sinks {
            if let Some(backend) = self.registry.find(&sink.backend_name) {
                if let Some(f) = &backend.destroy {
                    f(&mut sink.state);
                }
            }
        }
        self.sinks.clear();
    }
}
