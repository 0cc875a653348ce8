//! Dispatch index: per-method prefix buckets.
//!
//! Each method's stack is split into buckets keyed by the first
//! [`BUCKET_KEY_LEN`] bytes of a route's required literal prefix. Routes
//! whose required prefix is shorter than that ("global" routes, e.g.
//! `/:id`, `/*`, or the root middleware) are placed into every bucket and
//! into the fallback global bucket.
//!
//! A request is scanned against the bucket keyed by the first bytes of its
//! detection path, or the global bucket when no such bucket exists. A route
//! left out of that bucket requires a literal prefix the path does not
//! start with, so the index only ever skips routes that cannot match.
//!
//! ```text
//! GET stack:  [ USE /   , /api/users , /api/:id , /assets/* , /:slug ]
//!
//! "/ap" bucket:  [ USE / , /api/users , /api/:id , /:slug ]
//! "/as" bucket:  [ USE / , /assets/*  , /:slug ]
//! global:        [ USE / , /:slug ]
//! ```

use std::collections::HashMap;

use super::registry::Registry;
use super::route::{Route, RouteId};

/// Number of leading bytes that key a bucket. A tuning constant, not part
/// of the routing semantics.
pub const BUCKET_KEY_LEN: usize = 3;

/// Bucket key for a path, if it is long enough.
#[inline]
#[must_use]
pub fn bucket_key(path: &str) -> Option<[u8; BUCKET_KEY_LEN]> {
    path.as_bytes()
        .get(..BUCKET_KEY_LEN)
        .and_then(|b| b.try_into().ok())
}

fn route_key(route: &Route) -> Option<[u8; BUCKET_KEY_LEN]> {
    bucket_key(route.pattern().required_prefix())
}

#[derive(Debug, Clone, Default)]
struct MethodBuckets {
    keyed: HashMap<[u8; BUCKET_KEY_LEN], Vec<RouteId>>,
    global: Vec<RouteId>,
}

/// Prefix buckets for every configured method.
#[derive(Debug, Clone, Default)]
pub struct DispatchIndex {
    methods: Vec<MethodBuckets>,
}

impl DispatchIndex {
    /// Build buckets from the registry's current stacks. `O(R)` in routes per method and key.
    #[must_use]
    pub fn build(registry: &Registry) -> Self {
        let methods = (0..registry.methods().len())
            .map(|slot| {
                let stack = registry.stack(slot);
                let keys: Vec<Option<[u8; BUCKET_KEY_LEN]>> = stack
                    .iter()
                    .map(|id| registry.route(*id).and_then(route_key))
                    .collect();

                let mut buckets = MethodBuckets::default();
                for key in keys.iter().flatten() {
                    buckets.keyed.entry(*key).or_default();
                }
                for (id, key) in stack.iter().zip(&keys) {
                    match key {
                        None => {
                            buckets.global.push(*id);
                            for bucket in buckets.keyed.values_mut() {
                                bucket.push(*id);
                            }
                        }
                        Some(k) => {
                            if let Some(bucket) = buckets.keyed.get_mut(k) {
                                bucket.push(*id);
                            }
                        }
                    }
                }
                buckets
            })
            .collect();
        Self { methods }
    }

    /// The candidate routes for a detection path under a method slot.
    #[inline]
    #[must_use]
    pub fn bucket(&self, slot: usize, path: &str) -> &[RouteId] {
        let Some(buckets) = self.methods.get(slot) else {
            return &[];
        };
        bucket_key(path)
            .and_then(|k| buckets.keyed.get(&k))
            .unwrap_or(&buckets.global)
    }

    /// Keys and sizes of every bucket for a slot, sorted by key; the
    /// global bucket is reported with an empty key.
    #[must_use]
    pub fn layout(&self, slot: usize) -> Vec<(String, Vec<RouteId>)> {
        let Some(buckets) = self.methods.get(slot) else {
            return Vec::new();
        };
        let mut out: Vec<(String, Vec<RouteId>)> = buckets
            .keyed
            .iter()
            .map(|(k, ids)| (String::from_utf8_lossy(k).into_owned(), ids.clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out.insert(0, (String::new(), buckets.global.clone()));
        out
    }

    /// Number of keyed buckets across all methods.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.methods.iter().map(|m| m.keyed.len()).sum()
    }
}
