// Domain types shared by the router components
//
// Numan Thabit 2025 Nov

pub mod candidate;
pub mod coin;
pub mod pool;

pub use candidate::{CandidatePool, CandidateRoute, CandidateRoutes};
pub use coin::{Coin, Denom};
pub use pool::{CosmWasmPoolKind, Pool, PoolRecord, PoolType, SwapCapability};
