//! Collision resolution for merged listings.
//!
//! When several sources contribute an entry for the same logical slot, one
//! survives. The rule is the same for both collision keys:
//!
//! - the strictly highest weight wins
//! - on a tie, the entry met first (earliest source in chain order) wins
//! - directories are never collapsed; a directory present in several
//!   sources is merged structurally by listing it again
//! - zero-weight entries carry no language signal; they never evict and
//!   are only dropped when a positively weighted entry owns their key
//!
//! Resolution looks only at the batch it is given. Survivors keep their
//! relative order.

use std::collections::HashMap;

use tracing::debug;

use crate::vfs::EntryDescriptor;

/// Which name identifies "the same slot".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionKey {
    /// The on-disk name. Used inside one overlay listing.
    RawName,
    /// The language-normalised name. Used when reconciling listings whose
    /// markers have already been normalised.
    CanonicalName,
}

impl CollisionKey {
    fn of(self, entry: &EntryDescriptor) -> &str {
        match self {
            CollisionKey::RawName => &entry.raw_name,
            CollisionKey::CanonicalName => &entry.canonical_name,
        }
    }
}

/// Drop the losers of every collision in `entries`.
pub fn resolve_collisions(entries: Vec<EntryDescriptor>, key: CollisionKey) -> Vec<EntryDescriptor> {
    let evicted: Vec<bool> = {
        // key -> (index, weight) of the current winner
        let mut keep: HashMap<&str, (usize, u32)> = HashMap::new();

        for (idx, entry) in entries.iter().enumerate() {
            if entry.is_dir() || entry.weight == 0 {
                continue;
            }
            keep.entry(key.of(entry))
                .and_modify(|winner| {
                    if entry.weight > winner.1 {
                        *winner = (idx, entry.weight);
                    }
                })
                .or_insert((idx, entry.weight));
        }

        entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| {
                !entry.is_dir()
                    && keep
                        .get(key.of(entry))
                        .is_some_and(|&(winner, _)| winner != idx)
            })
            .collect()
    };

    let before = entries.len();
    let survivors: Vec<EntryDescriptor> = entries
        .into_iter()
        .zip(evicted)
        .filter_map(|(entry, gone)| (!gone).then_some(entry))
        .collect();

    if survivors.len() != before {
        debug!(
            ?key,
            evicted = before - survivors.len(),
            kept = survivors.len(),
            "resolved listing collisions"
        );
    }
    survivors
}

/// Resolve collisions keyed on the on-disk name.
pub fn resolve_by_raw_name(entries: Vec<EntryDescriptor>) -> Vec<EntryDescriptor> {
    resolve_collisions(entries, CollisionKey::RawName)
}

/// Resolve collisions keyed on the canonical name.
pub fn resolve_by_canonical_name(entries: Vec<EntryDescriptor>) -> Vec<EntryDescriptor> {
    resolve_collisions(entries, CollisionKey::CanonicalName)
}

/// Reconcile already-annotated listings by canonical name.
///
/// Listings are concatenated in the order given, so earlier listings win
/// weight ties.
pub fn merge_listings<I>(listings: I) -> Vec<EntryDescriptor>
where
    I: IntoIterator<Item = Vec<EntryDescriptor>>,
{
    let merged: Vec<EntryDescriptor> = listings.into_iter().flatten().collect();
    resolve_by_canonical_name(merged)
}
