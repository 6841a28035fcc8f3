//! Session and buffer management for tracepipe
//!
//! The pipeline owns the path from a producing trace session to the
//! sink. Each session gets a double buffer and a dedicated worker task:
//! producers append records to the active half while the worker
//! periodically swaps the halves, frames the drained half into bounded
//! messages, and hands them to the sink.
//!
//! ```text
//! [Producer] --write--> [BufferPair] <--swap-- [Worker] --frames--> [Sink]
//! ```
//!
//! # Design
//!
//! - A full active buffer drops the incoming record and counts it;
//!   producers are never blocked by a slow sink
//! - The worker is the only task that swaps and drains, so the drained
//!   half is accessed without further locking
//! - Shutdown is cooperative: cancelling a session's token triggers one
//!   final swap-and-drain before its worker exits
//! - The [`SessionRegistry`] is sharded to keep open/write/close of
//!   unrelated sessions from contending

mod buffer;
mod error;
mod manager;
mod registry;
mod session;
mod worker;

pub use buffer::{BufferPair, DrainedBuffer};
pub use error::{PipelineError, Result};
pub use manager::SessionManager;
pub use registry::SessionRegistry;
pub use session::{Session, SessionHandle};
pub use worker::{Worker, WorkerConfig, WorkerSummary};
