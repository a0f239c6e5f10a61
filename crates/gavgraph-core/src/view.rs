//! View identity, parameters, and per-view engine state.
//!
//! A view is the unit users query against: roots, a filter, and a selector.
//! Its short identifier is deterministic — a SHA-256 digest over the
//! canonical JSON descriptor (sorted root coordinates plus the filter and
//! selector descriptor strings), hex-encoded and truncated — so registering
//! the same configuration twice resolves to the same view.

use std::collections::{BTreeMap, BTreeSet};
use std::time::SystemTime;

use serde::Serialize;
use sha2::{Digest, Sha256};
use url::Url;

use crate::cache::ViewCache;
use crate::cycles::CycleRecord;
use crate::filter::{FilterRef, RelationshipFilter};
use crate::ident::{GroupArtifact, ProjectRef, VersionSpec};
use crate::select::{RelationshipSelector, SelectorRef};

/// Number of hex digits kept from the descriptor digest.
const SHORT_ID_LEN: usize = 16;

// ---------------------------------------------------------------------------
// ViewParams
// ---------------------------------------------------------------------------

/// User-supplied view configuration: roots, filter, selector.
#[derive(Debug, Clone)]
pub struct ViewParams {
    roots: Vec<ProjectRef>,
    filter: FilterRef,
    selector: SelectorRef,
}

impl ViewParams {
    /// Bundles a view configuration.
    pub fn new(roots: Vec<ProjectRef>, filter: FilterRef, selector: SelectorRef) -> Self {
        Self {
            roots,
            filter,
            selector,
        }
    }

    /// The root coordinates.
    pub fn roots(&self) -> &[ProjectRef] {
        &self.roots
    }

    /// The root filter.
    pub fn filter(&self) -> &FilterRef {
        &self.filter
    }

    /// The selector.
    pub fn selector(&self) -> &SelectorRef {
        &self.selector
    }
}

// ---------------------------------------------------------------------------
// Short id
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ViewDescriptor<'a> {
    roots: Vec<String>,
    filter: &'a str,
    selector: &'a str,
}

/// Encodes a byte slice as a lowercase hexadecimal string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(HEX_CHARS[(b >> 4) as usize] as char);
        out.push(HEX_CHARS[(b & 0x0f) as usize] as char);
    }
    out
}

/// Derives the stable short identifier for a view configuration.
pub(crate) fn short_id(params: &ViewParams) -> String {
    let mut roots: Vec<String> = params.roots().iter().map(ToString::to_string).collect();
    roots.sort();
    let filter = params.filter().describe();
    let selector = params.selector().describe();
    let descriptor = ViewDescriptor {
        roots,
        filter: &filter,
        selector: &selector,
    };
    // Serializing strings cannot fail; fall back to the raw descriptor parts
    // to keep determinism even if it ever did.
    let json = serde_json::to_string(&descriptor)
        .unwrap_or_else(|_| format!("{filter}|{selector}"));
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    let mut hex = hex_encode(&hasher.finalize());
    hex.truncate(SHORT_ID_LEN);
    hex
}

// ---------------------------------------------------------------------------
// ViewState
// ---------------------------------------------------------------------------

/// Engine-internal state of one registered view.
#[derive(Debug)]
pub(crate) struct ViewState {
    pub short_id: String,
    pub params: ViewParams,
    /// Registered ad-hoc selections, consulted before the selector.
    pub selections: BTreeMap<GroupArtifact, VersionSpec>,
    pub cache: ViewCache,
    /// `true` when the cache must be re-materialized before answering.
    pub dirty: bool,
    /// `true` when the cycle cache must be rebuilt before answering.
    pub cycle_pending: bool,
    pub cycles: Vec<CycleRecord>,
    pub active_pom_locations: BTreeSet<Url>,
    pub active_sources: BTreeSet<Url>,
    pub properties: BTreeMap<String, String>,
    pub last_access: SystemTime,
}

impl ViewState {
    pub fn new(short_id: String, params: ViewParams) -> Self {
        Self {
            short_id,
            params,
            selections: BTreeMap::new(),
            cache: ViewCache::default(),
            dirty: true,
            cycle_pending: true,
            cycles: Vec::new(),
            active_pom_locations: BTreeSet::new(),
            active_sources: BTreeSet::new(),
            properties: BTreeMap::new(),
            last_access: SystemTime::now(),
        }
    }

    /// Stamps the last-access timestamp.
    pub fn touch(&mut self) {
        self.last_access = SystemTime::now();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
