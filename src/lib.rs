//! Straight skeletons of polygon soups, computed by an external CGAL worker.
//!
//! The worker (`skeleton-cgal`) reads polygons on stdin and prints the skeleton
//! graph on stdout. This crate runs it under a watchdog, speaks its line
//! protocol, and hands back a [`SkeletonGraph`].
//!
//! ```no_run
//! use polygon_skeletons::SkeletonWorker;
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), polygon_skeletons::WorkerError> {
//! let worker = SkeletonWorker::new("/opt/skeleton/skeleton-cgal");
//! let square = vec![vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)]];
//! let graph = worker.compute(&square, Some(Duration::from_secs(10))).await?;
//! for node in graph.nodes() {
//!     println!("{} at {:?} r={}", node.id, node.position, node.radius);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod geometry;
pub mod graph;
pub mod watchdog;
pub mod wire;
pub mod worker;

pub use config::{load_config, SkeletonConfig, WatchdogConfig, WorkerConfig};
pub use geometry::{Point, Polygon};
pub use graph::{Node, NodeId, SkeletonGraph};
pub use watchdog::{Watchdog, WatchdogOutcome};
pub use wire::{
    decode_graph, decode_skeleton, encode_graph, encode_polygons, read_graph, write_graph,
    ProtocolError, Violation,
};
pub use worker::{SkeletonWorker, WorkerError};
