// Route split optimizer
// Ranks quoted candidates and rebalances an allocation across the best of
// them. Route output is concave in its input, so moving a step of amount
// from the route losing least to the route gaining most converges towards
// equal marginal rates
//
// Numan Thabit 2025 Nov

use crate::control::QueryContext;
use crate::domain::Coin;
use crate::errors::{RouterError, RouterResult};
use crate::metrics::MetricsSink;
use crate::router::quote::{SplitRoute, SwapMethod};
use crate::router::routes::Route;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, warn};

/// A candidate quoted for the whole request amount.
#[derive(Debug, Clone)]
pub struct RankedRoute {
    pub route: Route,
    pub in_amount: u128,
    pub out_amount: u128,
}

impl RankedRoute {
    pub fn into_split(self) -> SplitRoute {
        SplitRoute {
            route: self.route,
            in_amount: self.in_amount,
            out_amount: self.out_amount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitOptions {
    pub max_split_routes: usize,
    pub max_split_iterations: usize,
    /// Minimum objective improvement required to apply a move.
    pub convergence_epsilon: u128,
    pub initial_step_divisor: u32,
}

pub struct RouteSplitOptimizer<'a> {
    opts: SplitOptions,
    preferred: &'a BTreeSet<u64>,
    metrics: &'a dyn MetricsSink,
}

impl<'a> RouteSplitOptimizer<'a> {
    pub fn new(opts: SplitOptions, preferred: &'a BTreeSet<u64>, metrics: &'a dyn MetricsSink) -> Self {
        Self {
            opts,
            preferred,
            metrics,
        }
    }

    /// Quotes every route for the whole amount and orders them best first.
    /// Routes whose pools fail or that deliver nothing are dropped; NotFound
    /// if none survives.
    pub fn rank_routes(
        &self,
        ctx: &QueryContext,
        routes: Vec<Route>,
        method: SwapMethod,
        token_in_denom: &str,
        amount: u128,
    ) -> RouterResult<Vec<RankedRoute>> {
        let total = routes.len();
        let mut ranked = Vec::with_capacity(total);
        for route in routes {
            ctx.check("route ranking")?;
            match evaluate(&route, method, token_in_denom, amount) {
                Some((_, 0)) => {
                    debug!(pools = ?route.pool_ids().collect::<Vec<_>>(), "route quotes no tokens out");
                    self.metrics.route_dropped("zero_output");
                }
                Some((in_amount, out_amount)) => ranked.push(RankedRoute {
                    route,
                    in_amount,
                    out_amount,
                }),
                None => self.metrics.route_dropped("computation"),
            }
        }
        if ranked.is_empty() {
            return Err(RouterError::NotFound(format!(
                "no route could be quoted with a positive output ({total} candidates)"
            )));
        }

        ranked.sort_by(|a, b| self.compare(method, a, b));
        debug!(num_ranked = ranked.len(), num_candidates = total, "routes ranked");
        Ok(ranked)
    }

    /// Better first: realized price, then fewer hops, then preferred pools,
    /// then lowest aggregate pool ID.
    fn compare(&self, method: SwapMethod, a: &RankedRoute, b: &RankedRoute) -> Ordering {
        let price = match method {
            SwapMethod::ExactIn => b.out_amount.cmp(&a.out_amount),
            SwapMethod::ExactOut => a.in_amount.cmp(&b.in_amount),
        };
        let has_preferred = |r: &RankedRoute| r.route.pool_ids().any(|id| self.preferred.contains(&id));
        price
            .then(a.route.len().cmp(&b.route.len()))
            .then(has_preferred(b).cmp(&has_preferred(a)))
            .then(a.route.pool_id_sum().cmp(&b.route.pool_id_sum()))
    }

    /// Allocates `amount` across the ranked routes. The split is only kept
    /// when it strictly beats the best single route.
    pub fn optimize(
        &self,
        ctx: &QueryContext,
        ranked: Vec<RankedRoute>,
        method: SwapMethod,
        token_in_denom: &str,
        amount: u128,
    ) -> RouterResult<Vec<SplitRoute>> {
        let mut ranked = ranked.into_iter();
        let Some(best) = ranked.next() else {
            return Err(RouterError::NotFound("no ranked routes".into()));
        };
        if self.opts.max_split_routes <= 1 || amount < 2 {
            return Ok(vec![best.into_split()]);
        }

        // generalized cosmwasm pools need a network call per quote
        let mut eligible: Vec<Route> = std::iter::once(&best)
            .map(|r| r.route.clone())
            .chain(ranked.map(|r| r.route))
            .filter(|r| !r.contains_generalized_cosmwasm)
            .take(self.opts.max_split_routes)
            .collect();
        if eligible.len() < 2 {
            return Ok(vec![best.into_split()]);
        }

        let value = |route: &Route, a: u128| evaluate_amount(route, method, token_in_denom, a);
        let Some(allocation) = self.rebalance(ctx, &mut eligible, amount, method, &value) else {
            return Ok(vec![best.into_split()]);
        };

        let mut splits = Vec::new();
        for (route, share) in eligible.into_iter().zip(allocation) {
            if share == 0 {
                continue;
            }
            let Some((in_amount, out_amount)) = evaluate(&route, method, token_in_denom, share) else {
                return Err(RouterError::internal(format!(
                    "allocated route failed to requote for {share}"
                )));
            };
            splits.push(SplitRoute {
                route,
                in_amount,
                out_amount,
            });
        }

        let conserved = match method {
            SwapMethod::ExactIn => splits.iter().map(|s| s.in_amount).sum::<u128>() == amount,
            SwapMethod::ExactOut => splits.iter().map(|s| s.out_amount).sum::<u128>() >= amount,
        };
        if !conserved {
            return Err(RouterError::internal("split allocation does not conserve the request amount"));
        }

        let strictly_better = match method {
            SwapMethod::ExactIn => splits.iter().map(|s| s.out_amount).sum::<u128>() > best.out_amount,
            SwapMethod::ExactOut => splits.iter().map(|s| s.in_amount).sum::<u128>() < best.in_amount,
        };
        if splits.len() > 1 && strictly_better {
            debug!(num_splits = splits.len(), "split beats best single route");
            Ok(splits)
        } else {
            Ok(vec![best.into_split()])
        }
    }

    /// Marginal rebalancing. Returns the allocation aligned with `routes`
    /// (routes failing at the initial allocation are removed), or None when
    /// fewer than two routes remain usable.
    fn rebalance(
        &self,
        ctx: &QueryContext,
        routes: &mut Vec<Route>,
        total: u128,
        method: SwapMethod,
        value: &dyn Fn(&Route, u128) -> Option<u128>,
    ) -> Option<Vec<u128>> {
        // Objective to maximize: output for exact-in, negated input for exact-out.
        let score = |v: u128| -> i128 {
            let v = i128::try_from(v).unwrap_or(i128::MAX);
            match method {
                SwapMethod::ExactIn => v,
                SwapMethod::ExactOut => -v,
            }
        };

        let (mut alloc, mut current) = loop {
            if routes.len() < 2 {
                return None;
            }
            let alloc = equal_allocation(total, routes.len());
            let values: Vec<Option<u128>> = routes.iter().zip(&alloc).map(|(r, a)| value(r, *a)).collect();
            if values.iter().all(Option::is_some) {
                let current: Vec<i128> = values.into_iter().flatten().map(score).collect();
                break (alloc, current);
            }
            let mut keep = values.iter().map(Option::is_some);
            routes.retain(|_| keep.next().unwrap_or(false));
            self.metrics.route_dropped("split_initial_allocation");
        };

        let divisor = u128::from(self.opts.initial_step_divisor.max(1));
        let mut step = (total / (routes.len() as u128 * divisor)).max(1);
        let epsilon = i128::try_from(self.opts.convergence_epsilon).unwrap_or(i128::MAX);

        let marginal = |route: &Route, a: u128, cur: i128, step: u128| -> Marginal {
            let up = a
                .checked_add(step)
                .filter(|next| *next <= total)
                .and_then(|next| value(route, next))
                .map(|v| score(v) - cur);
            let down = a
                .checked_sub(step)
                .and_then(|prev| value(route, prev))
                .map(|v| cur - score(v));
            Marginal { gain: up, loss: down }
        };
        let mut marginals: Vec<Marginal> = (0..routes.len())
            .map(|i| marginal(&routes[i], alloc[i], current[i], step))
            .collect();

        let mut iterations = 0;
        while iterations < self.opts.max_split_iterations {
            if ctx.is_done() {
                warn!(iterations = iterations, "split optimization interrupted; using partial allocation");
                break;
            }
            iterations += 1;

            let receiver = best_index(marginals.iter().map(|m| m.gain), |g| g, None);
            let donor = receiver.and_then(|r| best_index(marginals.iter().map(|m| m.loss), |l| -l, Some(r)));

            if let (Some(r), Some(d)) = (receiver, donor) {
                let gain = marginals[r].gain.unwrap_or(i128::MIN);
                let loss = marginals[d].loss.unwrap_or(i128::MAX);
                if gain.saturating_sub(loss) > epsilon {
                    alloc[r] += step;
                    alloc[d] -= step;
                    current[r] += gain;
                    current[d] -= loss;
                    for i in [r, d] {
                        marginals[i] = marginal(&routes[i], alloc[i], current[i], step);
                    }
                    continue;
                }
            }

            if step == 1 {
                break;
            }
            step /= 2;
            marginals = (0..routes.len())
                .map(|i| marginal(&routes[i], alloc[i], current[i], step))
                .collect();
        }

        debug!(iterations = iterations, num_routes = routes.len(), "split rebalancing finished");
        Some(alloc)
    }
}

#[derive(Debug, Clone, Copy)]
struct Marginal {
    /// Objective change when `step` more is allocated.
    gain: Option<i128>,
    /// Objective given up when `step` is taken away.
    loss: Option<i128>,
}

/// Index of the highest `key(value)`, first on ties, skipping `exclude`.
fn best_index(
    values: impl Iterator<Item = Option<i128>>,
    key: impl Fn(i128) -> i128,
    exclude: Option<usize>,
) -> Option<usize> {
    let mut best: Option<(usize, i128)> = None;
    for (i, v) in values.enumerate() {
        if Some(i) == exclude {
            continue;
        }
        let Some(v) = v else { continue };
        let k = key(v);
        if best.map_or(true, |(_, bk)| k > bk) {
            best = Some((i, k));
        }
    }
    best.map(|(i, _)| i)
}

/// `total` split evenly; the remainder goes to the best-ranked routes.
fn equal_allocation(total: u128, n: usize) -> Vec<u128> {
    let n128 = n as u128;
    let base = total / n128;
    let remainder = (total % n128) as usize;
    (0..n).map(|i| base + u128::from(i < remainder)).collect()
}

/// (in, out) of a route for `amount`, interpreted per swap method.
fn evaluate(route: &Route, method: SwapMethod, token_in_denom: &str, amount: u128) -> Option<(u128, u128)> {
    match method {
        SwapMethod::ExactIn => route
            .calculate_token_out(&Coin::new(token_in_denom, amount))
            .ok()
            .map(|out| (amount, out.amount)),
        SwapMethod::ExactOut => {
            let needed = route.required_input_for(token_in_denom, amount).ok()?;
            let produced = route.calculate_token_out(&Coin::new(token_in_denom, needed)).ok()?;
            Some((needed, produced.amount))
        }
    }
}

/// The amount the objective is measured in: output for exact-in, required
/// input for exact-out.
fn evaluate_amount(route: &Route, method: SwapMethod, token_in_denom: &str, amount: u128) -> Option<u128> {
    evaluate(route, method, token_in_denom, amount).map(|(in_amount, out_amount)| match method {
        SwapMethod::ExactIn => out_amount,
        SwapMethod::ExactOut => in_amount,
    })
}

/// Drops routes sharing a pool with a better-ranked route; their independent
/// quotes would count that pool's liquidity twice.
pub fn filter_duplicate_pool_routes(ranked: Vec<RankedRoute>) -> Vec<RankedRoute> {
    let mut used: HashSet<u64> = HashSet::new();
    ranked
        .into_iter()
        .filter(|r| {
            let ids: Vec<u64> = r.route.pool_ids().collect();
            if ids.iter().any(|id| used.contains(id)) {
                return false;
            }
            used.extend(ids);
            true
        })
        .collect()
}
