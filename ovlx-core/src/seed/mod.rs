//! K-mer seeding for overlap discovery
//!
//! This module holds the minimizer codec, the search table indexing the
//! codes of every read and the compact hit index filled by each query.

pub mod hits;
pub mod minimizer;
pub mod table;
pub mod utils;

pub use hits::{decode_hit, encode_hit, KmerHit, KmerHitsTable};
pub use minimizer::{KmerCode, KmerCodec, MinimizerCodec};
pub use table::MinimizerTable;
