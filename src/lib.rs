//! runstream: a client for streamed, human-in-the-loop automation runs.
//!
//! An operator submits a free-form request against a target repository. The
//! remote automation server answers with a live text stream, which may contain
//! inline approval checkpoints. This crate consumes that stream, surfaces
//! checkpoints for approve / reject / edit decisions, supports cancellation and
//! keeps a history of finished sessions.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use runstream::api::HttpCollaborator;
//! use runstream::config::load_config;
//! use runstream::runtime::spawn_orchestrator;
//!
//! # async fn example() {
//! let config = load_config(None).unwrap();
//! let remote = Arc::new(HttpCollaborator::new(&config.server, &config.network));
//! let (orchestrator, mut events) = spawn_orchestrator(remote, &config).unwrap();
//! orchestrator.submit("create pipeline", "org/repo").await.unwrap();
//! while let Some(envelope) = events.recv().await {
//!     println!("{:?}", envelope.event);
//! }
//! # }
//! ```

pub mod api;
pub mod approval;
pub mod config;
pub mod error;
pub mod render;
pub mod runtime;
pub mod stream;
#[cfg(test)]
pub mod testsupport;
pub mod textutil;
