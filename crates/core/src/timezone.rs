//! Place-name to timezone resolution.
//!
//! A small curated alias layer is consulted before the full tz database
//! catalog. Matching is exact and case-insensitive; there is no fuzzy or
//! substring matching.

use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use chrono_tz::{Tz, TZ_VARIANTS};
use thiserror::Error;

/// Sortable local time, no fractional seconds and no offset suffix.
pub const LOCAL_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const INDIA_ALIASES: &[&str] = &["india", "asia/kolkata"];
// `america/los_angles` is kept as registered; the correct spelling resolves
// through the catalog instead.
const PACIFIC_ALIASES: &[&str] = &["pacific", "us/pacific", "america/los_angles", "california"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolutionPath {
    Utc,
    Alias,
    Catalog,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedZone {
    pub zone: Tz,
    pub path: ResolutionPath,
}

impl ResolvedZone {
    pub fn name(&self) -> &'static str {
        self.zone.name()
    }

    pub fn local_time(&self, now: DateTime<Utc>) -> String {
        now.with_timezone(&self.zone).format(LOCAL_TIME_FORMAT).to_string()
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("`{place}` is not a recognized timezone")]
    Unrecognized { place: String },
}

impl ResolveError {
    pub fn place(&self) -> &str {
        match self {
            Self::Unrecognized { place } => place,
        }
    }
}

/// Resolves a free-form place to a timezone: `utc`, then aliases, then the
/// full catalog.
pub fn resolve(place: &str) -> Result<ResolvedZone, ResolveError> {
    let key = place.to_lowercase();

    if key == "utc" {
        return Ok(ResolvedZone { zone: Tz::UTC, path: ResolutionPath::Utc });
    }

    if let Some(zone) = aliases().get(key.as_str()) {
        return Ok(ResolvedZone { zone: *zone, path: ResolutionPath::Alias });
    }

    if let Some(zone) = catalog().get(&key) {
        return Ok(ResolvedZone { zone: *zone, path: ResolutionPath::Catalog });
    }

    Err(ResolveError::Unrecognized { place: place.to_owned() })
}

/// Builds the alias table and catalog ahead of the first lookup.
pub fn preload() -> usize {
    aliases().len() + catalog().len()
}

pub fn catalog_names() -> impl Iterator<Item = &'static str> {
    TZ_VARIANTS.iter().map(|zone| zone.name())
}

fn aliases() -> &'static HashMap<&'static str, Tz> {
    static ALIASES: OnceLock<HashMap<&'static str, Tz>> = OnceLock::new();
    ALIASES.get_or_init(|| {
        let india = INDIA_ALIASES.iter().map(|alias| (*alias, Tz::Asia__Kolkata));
        let pacific = PACIFIC_ALIASES.iter().map(|alias| (*alias, Tz::America__Los_Angeles));
        india.chain(pacific).collect()
    })
}

fn catalog() -> &'static HashMap<String, Tz> {
    static CATALOG: OnceLock<HashMap<String, Tz>> = OnceLock::new();
    CATALOG.get_or_init(|| {
        TZ_VARIANTS.iter().map(|zone| (zone.name().to_ascii_lowercase(), *zone)).collect()
    })
}
