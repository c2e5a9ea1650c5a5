//! The Per-Site Aggregator: a pure function building each site's
//! [ChangeSet] from the detector's generic and site-scoped results by
//! unioning generic-scope tables into every site. No I/O, fully unit-testable.

use std::collections::HashMap;

use crate::model::row::{DetectedChanges, Scope, TableChanges};
use crate::model::{ChangeSet, SiteCode};

/// Builds `site -> ChangeSet` for every site in `sites`: each site receives
/// every generic-scope table's rows plus its own site-scoped rows. A table
/// present in both scopes for the same site cannot happen by construction
/// (the detector never emits both scopes for the same table), so tables
/// from the two scopes are simply unioned by key.
pub fn build_change_sets(
    detected: DetectedChanges,
    sites: &[SiteCode],
) -> HashMap<SiteCode, ChangeSet> {
    let mut generic: Vec<(crate::model::TableName, TableChanges)> = Vec::new();
    let mut by_site: HashMap<SiteCode, Vec<(crate::model::TableName, TableChanges)>> =
        HashMap::new();

    for ((scope, table), changes) in detected {
        match scope {
            Scope::Generic => generic.push((table, changes)),
            Scope::Site(site) => by_site.entry(site).or_default().push((table, changes)),
        }
    }

    let mut result = HashMap::new();
    for site in sites {
        let mut change_set: ChangeSet = HashMap::new();
        for (table, changes) in &generic {
            change_set.insert(table.clone(), changes.clone());
        }
        if let Some(site_tables) = by_site.get(site) {
            for (table, changes) in site_tables {
                change_set.insert(table.clone(), changes.clone());
            }
        }
        if !change_set.is_empty() {
            result.insert(site.clone(), change_set);
        }
    }
    result
}
