// Router orchestrator
// Public entry points of the router: optimal, single-route and custom quotes,
// candidate route lookups, route overwrites and state introspection. Each
// request runs against one pool generation loaded at its start
//
// Numan Thabit 2025 Nov

use crate::config::{CosmWasmPoolConfig, RouterConfig};
use crate::control::QueryContext;
use crate::domain::{CandidatePool, CandidateRoute, CandidateRoutes, Coin, Pool, PoolRecord};
use crate::errors::{RouterError, RouterResult};
use crate::metrics::{MetricsSink, CANDIDATE_CACHE, RANKED_CACHE};
use crate::router::cache::{RankedKey, RouterCache, RouterCacheConfig};
use crate::router::finder::{CandidateRouteFinder, CandidateRouteSearchOptions};
use crate::router::overwrite::RouteOverwriteStore;
use crate::router::quote::{Quote, SplitRoute, SwapMethod};
use crate::router::routes::Route;
use crate::router::split::{filter_duplicate_pool_routes, RankedRoute, RouteSplitOptimizer, SplitOptions};
use crate::router::taker_fee::{DenomPair, TakerFeeEntry};
use crate::state::{BlockPools, RouterGeneration, RouterState};
use crate::tokens::TokenMetadataProvider;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const STATE_BROADCAST_BUFFER: usize = 16;

/// Per-request overrides of the configured search and split limits.
/// Any search override bypasses both route caches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuoteOptions {
    pub max_routes: Option<usize>,
    pub max_pools_per_route: Option<usize>,
    pub max_split_routes: Option<usize>,
    pub min_pool_liquidity_cap: Option<u64>,
    pub disable_cache: bool,
}

impl QuoteOptions {
    fn overrides_search(&self) -> bool {
        self.max_routes.is_some() || self.max_pools_per_route.is_some() || self.min_pool_liquidity_cap.is_some()
    }

    fn use_cache(&self) -> bool {
        !self.disable_cache && !self.overrides_search()
    }
}

#[derive(Serialize)]
struct DenomPoolIds<'a> {
    denom: &'a str,
    pool_ids: Vec<u64>,
}

pub struct RouterOrchestrator {
    cfg: RouterConfig,
    preferred: BTreeSet<u64>,
    state: RouterState,
    finder: CandidateRouteFinder,
    cache: RouterCache,
    overwrites: RouteOverwriteStore,
    overwrites_enabled: bool,
    tokens: Arc<dyn TokenMetadataProvider>,
    metrics: Arc<dyn MetricsSink>,
}

impl RouterOrchestrator {
    pub fn new(
        cfg: RouterConfig,
        overwrites: RouteOverwriteStore,
        tokens: Arc<dyn TokenMetadataProvider>,
        metrics: Arc<dyn MetricsSink>,
    ) -> RouterResult<Self> {
        cfg.validate()
            .map_err(|e| RouterError::Validation(format!("{e:#}")))?;
        let cache = RouterCache::new(RouterCacheConfig {
            candidate_ttl: Duration::from_secs(cfg.candidate_route_cache_expiry_seconds),
            ranked_ttl: Duration::from_secs(cfg.ranked_route_cache_expiry_seconds),
            ranked_enabled: cfg.route_cache_enabled,
        });
        Ok(Self {
            preferred: cfg.preferred_pool_ids.iter().copied().collect(),
            cfg,
            state: RouterState::new(STATE_BROADCAST_BUFFER),
            finder: CandidateRouteFinder::new(),
            cache,
            overwrites,
            overwrites_enabled: true,
            tokens,
            metrics,
        })
    }

    /// Rejects every later overwrite submission and ignores persisted ones.
    pub fn without_route_overwrites(mut self) -> Self {
        self.overwrites_enabled = false;
        self
    }

    pub fn state(&self) -> &RouterState {
        &self.state
    }

    pub fn get_config(&self) -> &RouterConfig {
        &self.cfg
    }

    /// Candidate searches run since construction.
    pub fn finder_invocations(&self) -> u64 {
        self.finder.invocations()
    }

    /// Builds and publishes a new generation. Both caches hold topology only
    /// and outlive the block; entries leave on TTL expiry.
    pub fn apply_block(&self, block: BlockPools, cosmwasm: &CosmWasmPoolConfig) {
        let generation = RouterGeneration::build(block, &self.cfg, cosmwasm);
        self.state.store(generation);
    }

    /// Best split (or single route) quote for swapping `token_in`.
    #[tracing::instrument(skip_all, fields(token_in = %token_in, token_out = token_out_denom))]
    pub fn get_optimal_quote(
        &self,
        ctx: &QueryContext,
        token_in: &Coin,
        token_out_denom: &str,
        opts: QuoteOptions,
    ) -> RouterResult<Quote> {
        let start = Instant::now();
        let result = self.validate_request(&token_in.denom, token_out_denom, token_in.amount).and_then(|_| {
            self.quote_pipeline(
                ctx,
                SwapMethod::ExactIn,
                &token_in.denom,
                token_out_denom,
                token_in.amount,
                opts,
                true,
            )
        });
        self.metrics.quote_latency(SwapMethod::ExactIn.as_str(), start.elapsed());
        result
    }

    /// Minimum input of `token_in_denom` needed to receive `token_out`.
    #[tracing::instrument(skip_all, fields(token_out = %token_out, token_in = token_in_denom))]
    pub fn get_optimal_quote_in_given_out(
        &self,
        ctx: &QueryContext,
        token_out: &Coin,
        token_in_denom: &str,
        opts: QuoteOptions,
    ) -> RouterResult<Quote> {
        let start = Instant::now();
        let result = self.validate_request(token_in_denom, &token_out.denom, token_out.amount).and_then(|_| {
            self.quote_pipeline(
                ctx,
                SwapMethod::ExactOut,
                token_in_denom,
                &token_out.denom,
                token_out.amount,
                opts,
                true,
            )
        });
        self.metrics.quote_latency(SwapMethod::ExactOut.as_str(), start.elapsed());
        result
    }

    /// Same pipeline as [`Self::get_optimal_quote`] with splitting disabled.
    #[tracing::instrument(skip_all, fields(token_in = %token_in, token_out = token_out_denom))]
    pub fn get_best_single_route_quote(
        &self,
        ctx: &QueryContext,
        token_in: &Coin,
        token_out_denom: &str,
        opts: QuoteOptions,
    ) -> RouterResult<Quote> {
        let start = Instant::now();
        let result = self.validate_request(&token_in.denom, token_out_denom, token_in.amount).and_then(|_| {
            self.quote_pipeline(
                ctx,
                SwapMethod::ExactIn,
                &token_in.denom,
                token_out_denom,
                token_in.amount,
                opts,
                false,
            )
        });
        self.metrics.quote_latency("single_route", start.elapsed());
        result
    }

    /// Quotes the route through `pool_ids` in order. Intermediate denoms are
    /// searched depth-first over the denoms each pool shares with the next.
    #[tracing::instrument(skip_all, fields(token_in = %token_in, token_out = token_out_denom, pools = ?pool_ids))]
    pub fn get_custom_quote(
        &self,
        ctx: &QueryContext,
        token_in: &Coin,
        token_out_denom: &str,
        pool_ids: &[u64],
    ) -> RouterResult<Quote> {
        self.validate_request(&token_in.denom, token_out_denom, token_in.amount)?;
        if pool_ids.is_empty() {
            return Err(RouterError::Validation("no pool IDs given".into()));
        }
        let mut seen = BTreeSet::new();
        if let Some(dup) = pool_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(RouterError::Validation(format!("pool {dup} repeated in custom route")));
        }

        let generation = self.state.load();
        let pools = pool_ids
            .iter()
            .map(|id| {
                generation
                    .snapshot
                    .get(*id)
                    .map(|p| &**p)
                    .ok_or_else(|| RouterError::NotFound(format!("pool {id}")))
            })
            .collect::<RouterResult<Vec<&Pool>>>()?;
        let hops = custom_route_hops(&pools, &token_in.denom, token_out_denom).ok_or_else(|| {
            RouterError::Validation(format!(
                "pools {pool_ids:?} do not connect {} to {token_out_denom}",
                token_in.denom
            ))
        })?;
        self.quote_single_candidate(ctx, &generation, token_in, token_out_denom, CandidateRoute::new(hops))
    }

    /// One-hop quote through `pool_id`. Never consults the liquidity index, so
    /// no liquidity filter applies.
    #[tracing::instrument(skip_all, fields(token_in = %token_in, token_out = token_out_denom, pool_id = pool_id))]
    pub fn get_custom_direct_quote(
        &self,
        ctx: &QueryContext,
        token_in: &Coin,
        token_out_denom: &str,
        pool_id: u64,
    ) -> RouterResult<Quote> {
        self.validate_request(&token_in.denom, token_out_denom, token_in.amount)?;
        let generation = self.state.load();
        let candidate = CandidateRoute::new(vec![CandidatePool::new(pool_id, token_out_denom)]);
        self.quote_single_candidate(ctx, &generation, token_in, token_out_denom, candidate)
    }

    /// Route topology between two denoms. NotFound when no route exists.
    #[tracing::instrument(skip_all, fields(token_in = token_in_denom, token_out = token_out_denom))]
    pub fn get_candidate_routes(
        &self,
        ctx: &QueryContext,
        token_in_denom: &str,
        token_out_denom: &str,
        opts: QuoteOptions,
    ) -> RouterResult<CandidateRoutes> {
        let generation = self.state.load();
        self.candidate_routes(ctx, &generation, token_in_denom, token_out_denom, opts)
    }

    /// Cache-only lookup; never runs a search.
    pub fn get_cached_candidate_routes(
        &self,
        token_in_denom: &str,
        token_out_denom: &str,
    ) -> RouterResult<CandidateRoutes> {
        match self.cache.get_candidate_routes(token_in_denom, token_out_denom) {
            Some(routes) => {
                self.metrics.cache_hit(CANDIDATE_CACHE);
                Ok(routes)
            }
            None => {
                self.metrics.cache_miss(CANDIDATE_CACHE);
                Err(RouterError::CacheMiss {
                    token_in: token_in_denom.to_string(),
                    token_out: token_out_denom.to_string(),
                })
            }
        }
    }

    pub fn overwrite_routes(&self, token_in_denom: &str, routes: Vec<CandidateRoute>) -> RouterResult<()> {
        if !self.overwrites_enabled {
            return Err(RouterError::Validation("route overwrites are disabled".into()));
        }
        let generation = self.state.load();
        self.overwrites.overwrite(token_in_denom, routes, &generation.snapshot)
    }

    /// Loads persisted overrides against the current generation.
    pub fn load_overwrite_routes(&self) -> RouterResult<usize> {
        if !self.overwrites_enabled {
            return Ok(0);
        }
        let generation = self.state.load();
        self.overwrites.load(&generation.snapshot)
    }

    /// Taker fee of every denom pair the pool can swap.
    pub fn get_taker_fee(&self, pool_id: u64) -> RouterResult<Vec<TakerFeeEntry>> {
        let generation = self.state.load();
        let pool = generation
            .snapshot
            .get(pool_id)
            .ok_or_else(|| RouterError::NotFound(format!("pool {pool_id}")))?;

        let mut entries = Vec::new();
        for (i, a) in pool.denoms.iter().enumerate() {
            for b in &pool.denoms[i + 1..] {
                let DenomPair { denom0, denom1 } = DenomPair::new(a, b);
                let fee = generation.taker_fees.fee_or(a, b, self.cfg.default_taker_fee);
                entries.push(TakerFeeEntry { denom0, denom1, fee });
            }
        }
        Ok(entries)
    }

    /// Price of `base_denom` in `quote_denom` net of the pair's taker fee.
    pub fn get_pool_spot_price(&self, pool_id: u64, quote_denom: &str, base_denom: &str) -> RouterResult<Decimal> {
        let generation = self.state.load();
        let pool = generation
            .snapshot
            .get(pool_id)
            .ok_or_else(|| RouterError::NotFound(format!("pool {pool_id}")))?;
        for denom in [quote_denom, base_denom] {
            if !pool.has_denom(denom) {
                return Err(RouterError::Validation(format!("denom {denom} not found in pool {pool_id}")));
            }
        }
        let taker_fee = generation
            .taker_fees
            .fee_or(quote_denom, base_denom, self.cfg.default_taker_fee);
        let spot = pool.capability().calc_spot_price(base_denom, quote_denom)?;
        Ok(spot.saturating_mul(Decimal::ONE - taker_fee))
    }

    /// Liquidity filter the search uses for this pair.
    pub fn get_min_pool_liquidity_cap_filter(&self, token_in_denom: &str, token_out_denom: &str) -> u64 {
        let generation = self.state.load();
        self.min_liquidity_filter(&generation, token_in_denom, token_out_denom)
    }

    /// Writes the sorted pools, per-denom pool order and taker fees of the
    /// current generation as JSON files under `dir`.
    pub fn store_router_state_files(&self, dir: &Path) -> RouterResult<()> {
        let generation = self.state.load();
        fs::create_dir_all(dir)?;

        let mut pools: Vec<PoolRecord> = generation.snapshot.pools().map(|p| p.record()).collect();
        pools.sort_by_key(|p| p.id);
        fs::write(dir.join("pools.json"), serde_json::to_vec_pretty(&pools)?)?;

        let mut search_data: Vec<DenomPoolIds<'_>> = generation
            .index
            .sorted_pools()
            .map(|(denom, pools)| DenomPoolIds {
                denom: denom.as_str(),
                pool_ids: pools.iter().map(|p| p.id).collect(),
            })
            .collect();
        search_data.sort_by(|a, b| a.denom.cmp(b.denom));
        fs::write(
            dir.join("candidate_route_search_data.json"),
            serde_json::to_vec_pretty(&search_data)?,
        )?;

        fs::write(
            dir.join("taker_fees.json"),
            serde_json::to_vec_pretty(&generation.taker_fees.entries())?,
        )?;
        info!(dir = %dir.display(), height = generation.snapshot.height(), "router state files written");
        Ok(())
    }

    fn validate_request(&self, token_in_denom: &str, token_out_denom: &str, amount: u128) -> RouterResult<()> {
        if token_in_denom == token_out_denom {
            return Err(RouterError::Validation(format!(
                "token in and token out denoms are equal: {token_in_denom}"
            )));
        }
        if amount == 0 {
            return Err(RouterError::Validation("amount must be positive".into()));
        }
        for denom in [token_in_denom, token_out_denom] {
            if !self.tokens.is_valid_denom(denom) {
                return Err(RouterError::Validation(format!("unsupported denom {denom}")));
            }
        }
        Ok(())
    }

    fn min_liquidity_filter(&self, generation: &RouterGeneration, token_in_denom: &str, token_out_denom: &str) -> u64 {
        let min_tokens_cap = generation
            .index
            .denom_liquidity(token_in_denom)
            .min(generation.index.denom_liquidity(token_out_denom));
        self.cfg.min_liquidity_filter_for(min_tokens_cap)
    }

    fn split_optimizer(&self, max_split_routes: usize) -> RouteSplitOptimizer<'_> {
        RouteSplitOptimizer::new(
            SplitOptions {
                max_split_routes,
                max_split_iterations: self.cfg.max_split_iterations,
                convergence_epsilon: self.cfg.split_convergence_epsilon,
                initial_step_divisor: self.cfg.split_initial_step_divisor,
            },
            &self.preferred,
            self.metrics.as_ref(),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn quote_pipeline(
        &self,
        ctx: &QueryContext,
        method: SwapMethod,
        token_in_denom: &str,
        token_out_denom: &str,
        amount: u128,
        opts: QuoteOptions,
        allow_split: bool,
    ) -> RouterResult<Quote> {
        let generation = self.state.load();
        let max_split_routes = if allow_split {
            opts.max_split_routes.unwrap_or(self.cfg.max_split_routes)
        } else {
            1
        };
        let optimizer = self.split_optimizer(max_split_routes);

        if self.overwrites_enabled {
            if let Some(pinned) = self.overwrites.get(token_in_denom, token_out_denom) {
                debug!(num_routes = pinned.len(), "using route overwrite");
                let routes = self.attach_routes(&generation, &pinned, token_in_denom);
                let ranked = optimizer.rank_routes(ctx, routes, method, token_in_denom, amount)?;
                let best = ranked
                    .into_iter()
                    .next()
                    .ok_or_else(|| RouterError::internal("ranking returned no routes"))?;
                return self.prepare(method, token_in_denom, token_out_denom, amount, vec![best.into_split()]);
            }
        }

        let ranked_key = RankedKey::new(token_in_denom, token_out_denom, method, amount);
        let use_ranked_cache = opts.use_cache() && self.cfg.route_cache_enabled;

        let mut ranked: Option<Vec<RankedRoute>> = None;
        if use_ranked_cache {
            match self.cache.get_ranked_routes(&ranked_key) {
                Some(cached) => {
                    self.metrics.cache_hit(RANKED_CACHE);
                    let routes = self.attach_routes(&generation, &cached, token_in_denom);
                    if !routes.is_empty() {
                        ranked = Some(optimizer.rank_routes(ctx, routes, method, token_in_denom, amount)?);
                    }
                }
                None => self.metrics.cache_miss(RANKED_CACHE),
            }
        }

        let ranked = match ranked {
            Some(ranked) => ranked,
            None => {
                let candidates = self.candidate_routes(ctx, &generation, token_in_denom, token_out_denom, opts)?;
                let routes = self.attach_routes(&generation, &candidates.routes, token_in_denom);
                let ranked = filter_duplicate_pool_routes(optimizer.rank_routes(
                    ctx,
                    routes,
                    method,
                    token_in_denom,
                    amount,
                )?);
                if use_ranked_cache {
                    self.cache
                        .set_ranked_routes(ranked_key, ranked.iter().map(|r| r.route.to_candidate()).collect());
                }
                ranked
            }
        };

        let splits = optimizer.optimize(ctx, ranked, method, token_in_denom, amount)?;
        self.prepare(method, token_in_denom, token_out_denom, amount, splits)
    }

    fn candidate_routes(
        &self,
        ctx: &QueryContext,
        generation: &RouterGeneration,
        token_in_denom: &str,
        token_out_denom: &str,
        opts: QuoteOptions,
    ) -> RouterResult<CandidateRoutes> {
        let use_cache = opts.use_cache();
        if use_cache {
            if let Some(routes) = self.cache.get_candidate_routes(token_in_denom, token_out_denom) {
                self.metrics.cache_hit(CANDIDATE_CACHE);
                return Ok(routes);
            }
            self.metrics.cache_miss(CANDIDATE_CACHE);
        }

        let search = CandidateRouteSearchOptions {
            max_routes: opts.max_routes.unwrap_or(self.cfg.max_routes),
            max_pools_per_route: opts.max_pools_per_route.unwrap_or(self.cfg.max_pools_per_route),
            min_pool_liquidity_cap: opts
                .min_pool_liquidity_cap
                .unwrap_or_else(|| self.min_liquidity_filter(generation, token_in_denom, token_out_denom)),
        };
        let found = self
            .finder
            .find(ctx, &generation.index, token_in_denom, token_out_denom, &search)?;
        self.metrics.candidate_search();
        if found.is_empty() {
            return Err(RouterError::NotFound(format!(
                "no route from {token_in_denom} to {token_out_denom}"
            )));
        }

        let routes = CandidateRoutes::new(found);
        if use_cache {
            self.cache
                .set_candidate_routes(token_in_denom, token_out_denom, routes.clone());
        }
        Ok(routes)
    }

    /// Candidates that no longer fit the generation are dropped.
    fn attach_routes(
        &self,
        generation: &RouterGeneration,
        candidates: &[CandidateRoute],
        token_in_denom: &str,
    ) -> Vec<Route> {
        candidates
            .iter()
            .filter_map(|candidate| {
                match Route::attach(
                    candidate,
                    token_in_denom,
                    &generation.snapshot,
                    &generation.taker_fees,
                    self.cfg.default_taker_fee,
                ) {
                    Ok(route) => Some(route),
                    Err(err) => {
                        warn!(pools = ?candidate.pool_ids().collect::<Vec<_>>(), error = %err, "dropping candidate route");
                        self.metrics.route_dropped("attach");
                        None
                    }
                }
            })
            .collect()
    }

    fn quote_single_candidate(
        &self,
        ctx: &QueryContext,
        generation: &RouterGeneration,
        token_in: &Coin,
        token_out_denom: &str,
        candidate: CandidateRoute,
    ) -> RouterResult<Quote> {
        ctx.check("custom quote")?;
        let route = Route::attach(
            &candidate,
            &token_in.denom,
            &generation.snapshot,
            &generation.taker_fees,
            self.cfg.default_taker_fee,
        )?;
        let out = route.calculate_token_out(token_in)?;
        let split = SplitRoute {
            route,
            in_amount: token_in.amount,
            out_amount: out.amount,
        };
        self.prepare(SwapMethod::ExactIn, &token_in.denom, token_out_denom, token_in.amount, vec![split])
    }

    /// `amount` is the request's fixed side: input for exact-in, output for
    /// exact-out.
    fn prepare(
        &self,
        method: SwapMethod,
        token_in_denom: &str,
        token_out_denom: &str,
        amount: u128,
        splits: Vec<SplitRoute>,
    ) -> RouterResult<Quote> {
        let scaling = self.tokens.spot_price_scaling_factor(token_in_denom, token_out_denom);
        let mut quote = Quote::prepare(method, token_in_denom, token_out_denom, splits, scaling, self.metrics.as_ref())?;
        if method == SwapMethod::ExactOut {
            // split outputs may overshoot by bisection rounding
            quote.amount_out.amount = amount;
        }
        debug!(
            amount_in = %quote.amount_in,
            amount_out = %quote.amount_out,
            num_splits = quote.route.len(),
            "quote prepared"
        );
        Ok(quote)
    }
}

/// Depth-first choice of intermediate denoms for an ordered pool path. Each
/// pool must hold the incoming denom; every denom it shares with the next
/// pool is tried before giving up.
fn custom_route_hops(pools: &[&Pool], denom_in: &str, token_out_denom: &str) -> Option<Vec<CandidatePool>> {
    let (pool, rest) = pools.split_first()?;
    if !pool.has_denom(denom_in) {
        return None;
    }
    let Some(next) = rest.first() else {
        let connects = denom_in != token_out_denom && pool.has_denom(token_out_denom);
        return connects.then(|| vec![CandidatePool::new(pool.id, token_out_denom)]);
    };
    pool.denoms
        .iter()
        .filter(|d| d.as_str() != denom_in && next.has_denom(d))
        .find_map(|d| {
            let mut tail = custom_route_hops(rest, d, token_out_denom)?;
            tail.insert(0, CandidatePool::new(pool.id, d.clone()));
            Some(tail)
        })
}
