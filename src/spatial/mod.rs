mod index;
mod search;

pub use index::{IndexAlgorithm, NeighborIndex, NeighborQuery, DEFAULT_NEIGHBORS};
pub use search::NeighborSearch;
