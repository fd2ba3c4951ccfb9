//! `dvz`: a declarative GPU scientific-visualization engine.
//!
//! This crate is a thin facade over the workspace's component crates —
//! allocator/atomics, FIFO/Deq, list/map collections, the request
//! protocol, the requester, the viewset compositor, visuals/params, the
//! frame-stream registry and lifecycle, the video encoder orchestrator and
//! its backends, and the atlas/colormap/font subsystem. Pull in the
//! individual crates directly if you only need one piece.
//!
//! Austin Shafer - 2020

pub use dvz_alloc as alloc;
pub use dvz_atlas as atlas;
pub use dvz_collections as collections;
pub use dvz_fifo as fifo;
pub use dvz_request as request;
pub use dvz_stream as stream;
pub use dvz_video as video;
pub use dvz_viewset as viewset;
pub use dvz_visual as visual;
