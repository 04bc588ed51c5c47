//! Paginated, tombstone-aware membership enumeration.
//!
//! A page is built in passes: take what the session cache already knows
//! past the cursor, top it up with a fresh range scan when the cache runs
//! short, and repeat while tombstones keep trimming the page below what
//! was asked for. Each pass is a "bounded recursion" step in the sense the
//! algorithm is usually described — implemented here as an explicit
//! depth-counted loop, which is the more natural shape for this in Rust
//! and behaves identically.

use crate::cache::EnumerationCache;
use core_types::entries::GroupKeyName;
use core_types::keys::{access_group_member_enum_key, access_group_member_enum_prefix};
use core_types::{CoreError, CoreResult, Pkid, PUBLIC_KEY_LENGTH};
use state::StagedView;
use store::db::CF_ACCESS_GROUP_MEMBER_ENUM_INDEX;

const MAX_PASSES: u32 = 16;

fn member_from_enum_key(key: &[u8]) -> CoreResult<Pkid> {
    if key.len() < PUBLIC_KEY_LENGTH {
        return Err(CoreError::Encoding("access-group enum key too short".to_string()));
    }
    let bytes: [u8; PUBLIC_KEY_LENGTH] =
        key[key.len() - PUBLIC_KEY_LENGTH..].try_into().map_err(|_| CoreError::Encoding("malformed enum key".to_string()))?;
    Ok(Pkid::from(bytes))
}

/// One merged (staged-over-store) scan of a group's live members, starting
/// strictly after `after` (or from the group's absolute first member if
/// `after` is `None`), returning at most `limit` of them.
fn scan_members(
    view: &StagedView,
    owner_pkid: &Pkid,
    group_key_name: &GroupKeyName,
    after: Option<&Pkid>,
    limit: usize,
) -> CoreResult<Vec<Pkid>> {
    let prefix = access_group_member_enum_prefix(owner_pkid, group_key_name);
    let scan_key = match after {
        Some(member) => access_group_member_enum_key(owner_pkid, group_key_name, member),
        None => prefix.clone(),
    };
    let scanned = view.scan_from(CF_ACCESS_GROUP_MEMBER_ENUM_INDEX, &scan_key).map_err(|e| CoreError::Encoding(e.to_string()))?;

    let mut out = Vec::new();
    for (key, _) in scanned {
        if !key.starts_with(&prefix) {
            break;
        }
        let member = member_from_enum_key(&key)?;
        if after == Some(&member) {
            continue;
        }
        out.push(member);
        if out.len() == limit {
            break;
        }
    }
    Ok(out)
}

/// Returns up to `max_n` live member PKIDs of `(owner, name)` strictly
/// greater than `start_key`, ascending. `cache` may be reused across calls
/// against the same view to avoid rescanning members already seen; it is
/// invalidated by [`crate::member::apply`] whenever the group's membership
/// changes.
pub fn enumerate(
    view: &StagedView,
    cache: &mut EnumerationCache,
    owner_pkid: &Pkid,
    group_key_name: &GroupKeyName,
    start_key: Option<Pkid>,
    max_n: usize,
) -> CoreResult<Vec<Pkid>> {
    if max_n == 0 {
        return Ok(Vec::new());
    }

    let mut result: Vec<Pkid> = Vec::new();
    let mut cursor = start_key;

    for pass in 0..MAX_PASSES {
        let needed = max_n - result.len();
        if needed == 0 {
            break;
        }

        // Steps 1-3: take the cached slice past the cursor; top it up with
        // a fresh scan when the cache doesn't cover the remainder.
        let cached_tail = cache.get(owner_pkid, group_key_name).map(<[Pkid]>::to_vec).unwrap_or_default();
        let mut page: Vec<Pkid> = cached_tail.iter().filter(|m| cursor.as_ref().map_or(true, |c| *m > c)).copied().collect();

        if page.len() < needed {
            let scan_after = page.last().copied().or(cursor);
            let fresh = scan_members(view, owner_pkid, group_key_name, scan_after.as_ref(), needed - page.len())?;

            let cache_exists = cache.get(owner_pkid, group_key_name).is_some();
            if !page.is_empty() && cache_exists {
                // Extending exactly at the cache's own known tail.
                cache.extend(owner_pkid, group_key_name, fresh.clone());
            } else if page.is_empty() && !cache_exists && cursor.is_none() {
                // First-ever scan for this group, from the true beginning.
                cache.install(*owner_pkid, *group_key_name, fresh.clone());
            }
            // Any other shape (a cursor jumping past what's cached, or a
            // cold cache queried mid-list) is served ad hoc without
            // mutating the cache — installing it would claim a prefix the
            // scan never actually covered.

            page.extend(fresh);
        }

        if page.is_empty() {
            // Either there was truly nothing left, or a pass produced no
            // forward progress; either way, stop rather than spin.
            break;
        }

        cursor = page.last().copied();
        result.extend(page);

        if pass == MAX_PASSES - 1 && result.len() < max_n {
            return Err(CoreError::EnumerationRecursionLimit);
        }
    }

    Ok(result)
}
