//! OVLX Core Library
//!
//! Minimizer based overlap discovery, relationship scoring and Kruskal path
//! layout for long read genome assembly.

pub mod builder;
pub mod config;
pub mod discovery;
pub mod error;
pub mod graph;
pub mod layout;
pub mod pool;
pub mod scoring;
pub mod seed;
pub mod types;

// Re-export commonly used types and functions
pub use builder::GraphBuilder;
pub use config::{LayoutConfig, LayoutThresholds};
pub use discovery::{RelationshipFinder, SearchMode};
pub use error::{LayoutError, LayoutResult};
pub use graph::path::AssemblyPath;
pub use graph::relationship::{AssemblyEdge, AssemblyEmbedded, AssemblyVertex, Evidence, Relationship};
pub use graph::{AssemblyGraph, SequenceStatus};
pub use layout::KruskalPathLayout;
pub use pool::WorkerPool;
pub use scoring::ScoresCalculator;
pub use seed::{KmerCodec, KmerHitsTable, MinimizerCodec, MinimizerTable};
pub use types::{GenomeEstimate, KmerFrequencyModel, Sequence, SequenceId};

/// Version information for the OVLX core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
