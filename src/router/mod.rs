// Router module - route search, quoting and split optimization
// This file wires the liquidity index, candidate finder, quote engine,
// split optimizer, caches and overwrite store behind the orchestrator
//
// Numan Thabit 2025 Nov

pub mod cache;
pub mod finder;
pub mod index;
pub mod overwrite;
pub mod quote;
pub mod routes;
pub mod split;
pub mod taker_fee;

#[allow(clippy::module_inception)]
pub mod router;

pub use cache::{ExpiringCache, RouterCache};
pub use finder::{CandidateRouteFinder, CandidateRouteSearchOptions};
pub use index::PoolLiquidityIndex;
pub use overwrite::RouteOverwriteStore;
pub use quote::{Quote, SplitRoute, SwapMethod};
pub use router::{QuoteOptions, RouterOrchestrator};
pub use routes::{RoutablePool, Route, RouteQuote};
pub use split::{RankedRoute, RouteSplitOptimizer, SplitOptions};
pub use taker_fee::{DenomPair, TakerFeeEntry, TakerFeeRepository};
