// Route overwrite store
// Operator-pinned routes per input denom. Every submission is validated as
// a whole against the current pool snapshot and persisted as one JSON file
// per input denom
//
// Numan Thabit 2025 Nov

use crate::domain::{CandidateRoute, Denom};
use crate::errors::{OverwriteViolation, RouterError, RouterResult};
use crate::state::PoolSnapshot;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Persisted form of one accepted override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverwriteRecord {
    pub token_in_denom: Denom,
    pub routes: Vec<CandidateRoute>,
}

/// Validation accumulator; every problem is collected before rejecting.
#[derive(Debug, Default)]
pub struct ValidationResult {
    violations: Vec<OverwriteViolation>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, violation: OverwriteViolation) {
        self.violations.push(violation);
    }

    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn into_result(self) -> RouterResult<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(RouterError::InvalidOverwrite(self.violations))
        }
    }
}

/// Checks that every pool exists, holds its hop denoms, appears once per
/// route, and that all routes end in the same denom.
pub fn validate_overwrite(
    token_in_denom: &str,
    routes: &[CandidateRoute],
    snapshot: &PoolSnapshot,
) -> ValidationResult {
    let mut result = ValidationResult::new();
    if routes.is_empty() {
        result.add_error(OverwriteViolation::NoRoutes);
        return result;
    }

    let mut expected_out: Option<&str> = None;
    for (route_index, route) in routes.iter().enumerate() {
        if route.is_empty() {
            result.add_error(OverwriteViolation::EmptyRoute { route_index });
            continue;
        }

        let mut seen = HashSet::new();
        let mut denom_in = token_in_denom;
        for hop in &route.pools {
            if !seen.insert(hop.id) {
                result.add_error(OverwriteViolation::RepeatedPool {
                    route_index,
                    pool_id: hop.id,
                });
            }
            match snapshot.get(hop.id) {
                None => result.add_error(OverwriteViolation::PoolNotFound {
                    route_index,
                    pool_id: hop.id,
                }),
                Some(pool) => {
                    for denom in [denom_in, hop.token_out_denom.as_str()] {
                        if !pool.has_denom(denom) {
                            result.add_error(OverwriteViolation::DenomNotInPool {
                                route_index,
                                pool_id: hop.id,
                                denom: denom.to_string(),
                            });
                        }
                    }
                }
            }
            denom_in = hop.token_out_denom.as_str();
        }

        if let Some(actual) = route.token_out_denom() {
            match expected_out {
                None => expected_out = Some(actual),
                Some(expected) if expected != actual => {
                    result.add_error(OverwriteViolation::TokenOutMismatch {
                        route_index,
                        expected: expected.to_string(),
                        actual: actual.to_string(),
                    })
                }
                Some(_) => {}
            }
        }
    }
    result
}

#[derive(Debug)]
pub struct RouteOverwriteStore {
    dir: Option<PathBuf>,
    overrides: DashMap<Denom, Vec<CandidateRoute>>,
    // one writer at a time so the file and the map agree
    writer: Mutex<()>,
}

impl RouteOverwriteStore {
    /// `dir` is where accepted overrides are persisted; None keeps them in memory.
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            overrides: DashMap::new(),
            writer: Mutex::new(()),
        }
    }

    /// Validates and installs an override for `token_in_denom`, replacing any
    /// previous one. Nothing changes if any route is invalid.
    pub fn overwrite(
        &self,
        token_in_denom: &str,
        routes: Vec<CandidateRoute>,
        snapshot: &PoolSnapshot,
    ) -> RouterResult<()> {
        validate_overwrite(token_in_denom, &routes, snapshot).into_result()?;

        let _guard = self
            .writer
            .lock()
            .map_err(|_| RouterError::internal("route overwrite writer lock poisoned"))?;
        if let Some(dir) = &self.dir {
            let record = OverwriteRecord {
                token_in_denom: token_in_denom.to_string(),
                routes: routes.clone(),
            };
            fs::create_dir_all(dir)?;
            fs::write(record_path(dir, token_in_denom), serde_json::to_vec_pretty(&record)?)?;
        }
        self.overrides.insert(token_in_denom.to_string(), routes);
        info!(token_in = token_in_denom, active = self.len(), "route overwrite installed");
        Ok(())
    }

    /// Loads every persisted override, validating each one again. A missing
    /// directory is not an error.
    pub fn load(&self, snapshot: &PoolSnapshot) -> RouterResult<usize> {
        let Some(dir) = &self.dir else {
            return Ok(0);
        };
        if !dir.exists() {
            debug!(dir = %dir.display(), "no route overwrite directory; nothing to load");
            return Ok(0);
        }

        let mut loaded = 0;
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();
        for path in paths {
            let record: OverwriteRecord = serde_json::from_slice(&fs::read(&path)?)?;
            match validate_overwrite(&record.token_in_denom, &record.routes, snapshot).into_result() {
                Ok(()) => {
                    self.overrides.insert(record.token_in_denom, record.routes);
                    loaded += 1;
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping invalid persisted route overwrite");
                }
            }
        }
        info!(loaded = loaded, "route overwrites loaded");
        Ok(loaded)
    }

    /// Override routes for `token_in_denom` that end in `token_out_denom`.
    pub fn get(&self, token_in_denom: &str, token_out_denom: &str) -> Option<Vec<CandidateRoute>> {
        let routes = self.overrides.get(token_in_denom)?;
        let ends_in_out = routes
            .first()
            .and_then(|r| r.token_out_denom())
            .is_some_and(|d| d == token_out_denom);
        ends_in_out.then(|| routes.value().clone())
    }

    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}

fn record_path(dir: &Path, token_in_denom: &str) -> PathBuf {
    dir.join(format!("{}.json", hex::encode(token_in_denom)))
}
