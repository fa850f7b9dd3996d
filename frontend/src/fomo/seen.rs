use std::collections::{BTreeMap, HashSet, VecDeque};

use serde_json::Value;

use crate::config::DimensionConfig;
use crate::fomo::store::{ObfuscatedStore, Provenance};

/// Normalized identity key -> last time it was shown (epoch ms).
pub type SeenMap = BTreeMap<String, i64>;

/// TTL-bounded, size-capped record of recently shown keys for one
/// dimension.
///
/// `unseen -> seen(ts) -> expired -> unseen`. Expiry is applied when the map
/// is loaded or explicitly pruned, never per lookup.
#[derive(Debug, Clone)]
pub struct SeenTracker {
    storage_key: String,
    ttl_ms: i64,
    max_size: usize,
}

impl SeenTracker {
    pub fn new(config: &DimensionConfig) -> Self {
        Self {
            storage_key: config.storage_key.to_string(),
            ttl_ms: config.ttl_ms,
            max_size: config.max_size,
        }
    }

    /// Reads the persisted map and drops expired entries.
    ///
    /// Legacy shapes (bare key arrays, plaintext maps) and malformed or
    /// undecodable values are rewritten in the current format as a side
    /// effect.
    pub fn load(&self, store: &ObfuscatedStore, now: i64) -> SeenMap {
        let (map, needs_rewrite) = self.read(store, now);
        if needs_rewrite {
            return self.write(store, &map);
        }
        map
    }

    pub fn prune(&self, map: &mut SeenMap, now: i64) {
        let ttl = self.ttl_ms;
        map.retain(|_, ts| now.saturating_sub(*ts) <= ttl);
    }

    pub fn has(map: &SeenMap, key: &str) -> bool {
        map.contains_key(key)
    }

    pub fn add(map: &mut SeenMap, key: &str, now: i64) {
        map.insert(key.to_string(), now);
    }

    /// Read-merge-write: folds `map` into whatever is stored now, prunes,
    /// keeps the `max_size` newest entries and writes them. Returns what was
    /// written.
    pub fn persist(&self, store: &ObfuscatedStore, map: &SeenMap, now: i64) -> SeenMap {
        let (mut stored, _) = self.read(store, now);
        merge_max(&mut stored, map);
        self.prune(&mut stored, now);
        self.write(store, &stored)
    }

    /// Pruned stored map, plus whether the stored value should be rewritten.
    fn read(&self, store: &ObfuscatedStore, now: i64) -> (SeenMap, bool) {
        let Some(loaded) = store.load::<Value>(&self.storage_key) else {
            if store.contains(&self.storage_key) {
                log::warn!("Discarding undecodable seen-list {}", self.storage_key);
                return (SeenMap::new(), true);
            }
            return (SeenMap::new(), false);
        };

        let (mut map, needs_rewrite) = match loaded.value {
            Value::Array(keys) => {
                log::info!("Upgrading legacy seen-list {} ({} keys)", self.storage_key, keys.len());
                (stamp_keys(&keys, now), true)
            }
            Value::Object(entries) => (
                entries
                    .into_iter()
                    .filter_map(|(k, ts)| timestamp(&ts).map(|ts| (k, ts)))
                    .collect::<SeenMap>(),
                loaded.provenance == Provenance::Legacy,
            ),
            other => {
                log::warn!("Discarding malformed seen-list {}: {}", self.storage_key, other);
                (SeenMap::new(), true)
            }
        };

        self.prune(&mut map, now);
        (map, needs_rewrite)
    }

    fn write(&self, store: &ObfuscatedStore, map: &SeenMap) -> SeenMap {
        let kept = truncate_newest(map, self.max_size);
        if let Err(e) = store.set(&self.storage_key, &kept) {
            log::warn!("Persisting {} failed: {}", self.storage_key, e);
        }
        kept
    }
}

/// JS tabs may have written timestamps as floats.
pub fn timestamp(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))
}

/// Turns a bare key list into a map stamped with `now`.
pub fn stamp_keys(keys: &[Value], now: i64) -> SeenMap {
    keys.iter()
        .filter_map(Value::as_str)
        .map(|k| (k.to_string(), now))
        .collect()
}

/// Newest `max_size` entries by timestamp. Ties break on key so the result
/// does not depend on map iteration order.
pub fn truncate_newest(map: &SeenMap, max_size: usize) -> SeenMap {
    if map.len() <= max_size {
        return map.clone();
    }
    let mut entries: Vec<(&String, &i64)> = map.iter().collect();
    entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    entries
        .into_iter()
        .take(max_size)
        .map(|(k, ts)| (k.clone(), *ts))
        .collect()
}

/// Folds `remote` into `local` keeping the freshest timestamp per key.
pub fn merge_max(local: &mut SeenMap, remote: &SeenMap) {
    for (key, ts) in remote {
        let entry = local.entry(key.clone()).or_insert(*ts);
        if *ts > *entry {
            *entry = *ts;
        }
    }
}

#[cfg(test)]
pub fn merged(a: &SeenMap, b: &SeenMap) -> SeenMap {
    let mut out = a.clone();
    merge_max(&mut out, b);
    out
}

/// Short-term cooldown: bans the last `window` keys and keeps at most twice
/// that many around.
#[derive(Debug, Clone, Default)]
pub struct RecentHistory {
    window: usize,
    keys: VecDeque<String>,
}

impl RecentHistory {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            keys: VecDeque::with_capacity(window * 2),
        }
    }

    pub fn push(&mut self, key: String) {
        self.keys.push_back(key);
        while self.keys.len() > self.window * 2 {
            self.keys.pop_front();
        }
    }

    pub fn recent(&self) -> impl Iterator<Item = &String> {
        let skip = self.keys.len().saturating_sub(self.window);
        self.keys.iter().skip(skip)
    }

    pub fn extend_bans(&self, bans: &mut HashSet<String>) {
        bans.extend(self.recent().cloned());
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.keys.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fomo::codec::ObfuscationCodec;
    use crate::fomo::store::{KeyValueMedium, MemoryMedium};
    use quickcheck_macros::quickcheck;
    use rstest::rstest;
    use std::rc::Rc;

    const DAY: i64 = 24 * 60 * 60 * 1000;

    fn store() -> (Rc<MemoryMedium>, ObfuscatedStore) {
        let medium = Rc::new(MemoryMedium::new());
        let codec = Rc::new(ObfuscationCodec::with_iterations("pepper", "origin", 2));
        (medium.clone(), ObfuscatedStore::new(medium, codec))
    }

    fn tracker(ttl_ms: i64, max_size: usize) -> SeenTracker {
        SeenTracker::new(&DimensionConfig {
            storage_key: "seen_names",
            ttl_ms,
            max_size,
        })
    }

    #[test]
    fn load_prunes_expired_entries() {
        let (_, store) = store();
        let t = tracker(21 * DAY, 100);
        let now = 100 * DAY;
        let map: SeenMap = [
            ("fresh".to_string(), now - DAY),
            ("edge".to_string(), now - 21 * DAY),
            ("stale".to_string(), now - 22 * DAY),
        ]
        .into_iter()
        .collect();
        store.set("seen_names", &map).unwrap();

        let loaded = t.load(&store, now);
        assert!(SeenTracker::has(&loaded, "fresh"));
        assert!(SeenTracker::has(&loaded, "edge"));
        assert!(!SeenTracker::has(&loaded, "stale"));
        assert!(loaded.values().all(|ts| now - ts <= 21 * DAY));
    }

    #[test]
    fn legacy_plaintext_array_is_upgraded() {
        let (medium, store) = store();
        medium.set("seen_names", r#"["alice","bob"]"#).unwrap();
        let now = 5_000;

        let loaded = tracker(DAY, 100).load(&store, now);
        assert_eq!(loaded.get("alice"), Some(&now));
        assert_eq!(loaded.get("bob"), Some(&now));

        let raw = medium.raw("seen_names").unwrap();
        assert!(raw.starts_with("enc:v1:"));
        let written: SeenMap = store.get("seen_names").unwrap();
        assert_eq!(written, loaded);
    }

    #[test]
    fn legacy_plaintext_map_is_encrypted_on_load() {
        let (medium, store) = store();
        medium.set("seen_names", r#"{"alice":4000,"bob":"oops"}"#).unwrap();

        let loaded = tracker(DAY, 100).load(&store, 5_000);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get("alice"), Some(&4000));
        assert!(medium.raw("seen_names").unwrap().starts_with("enc:v1:"));
    }

    #[rstest]
    #[case("42")]
    #[case("\"just a string\"")]
    #[case("null")]
    fn malformed_shapes_load_empty_and_are_rewritten(#[case] raw: &str) {
        let (medium, store) = store();
        medium.set("seen_names", raw).unwrap();

        let loaded = tracker(DAY, 100).load(&store, 1_000);
        assert!(loaded.is_empty());
        let written: SeenMap = store.get("seen_names").unwrap();
        assert!(written.is_empty());
    }

    #[rstest]
    #[case("enc:v1:AAAAAAAAAAAAAAAA:AAAA")]
    #[case("{not json")]
    fn undecodable_value_loads_empty_and_is_rewritten(#[case] raw: &str) {
        let (medium, store) = store();
        medium.set("seen_names", raw).unwrap();

        assert!(tracker(DAY, 100).load(&store, 1_000).is_empty());
        assert_ne!(medium.raw("seen_names").as_deref(), Some(raw));
        let written: SeenMap = store.get("seen_names").unwrap();
        assert!(written.is_empty());
    }

    #[test]
    fn absent_key_is_not_written_on_load() {
        let (medium, store) = store();
        assert!(tracker(DAY, 100).load(&store, 1_000).is_empty());
        assert!(medium.raw("seen_names").is_none());
    }

    #[test]
    fn persist_merges_with_what_another_tab_stored() {
        let (_, store) = store();
        let t = tracker(DAY, 100);
        let theirs: SeenMap = [("ada".to_string(), 900), ("bea".to_string(), 500)].into_iter().collect();
        store.set("seen_names", &theirs).unwrap();

        let ours: SeenMap = [("bea".to_string(), 800), ("cy".to_string(), 1_000)].into_iter().collect();
        let kept = t.persist(&store, &ours, 1_000);

        let written: SeenMap = store.get("seen_names").unwrap();
        assert_eq!(kept, written);
        assert_eq!(written.get("ada"), Some(&900));
        assert_eq!(written.get("bea"), Some(&800));
        assert_eq!(written.get("cy"), Some(&1_000));
    }

    #[test]
    fn persist_prunes_expired_entries_from_either_side() {
        let (_, store) = store();
        let t = tracker(DAY, 100);
        let now = 10 * DAY;
        let theirs: SeenMap = [("old".to_string(), now - 2 * DAY)].into_iter().collect();
        store.set("seen_names", &theirs).unwrap();

        let ours: SeenMap = [("stale".to_string(), now - 3 * DAY), ("new".to_string(), now)]
            .into_iter()
            .collect();
        let kept = t.persist(&store, &ours, now);
        assert_eq!(kept.keys().cloned().collect::<Vec<_>>(), vec!["new".to_string()]);
    }

    #[test]
    fn persist_keeps_newest_entries() {
        let (_, store) = store();
        let t = tracker(DAY, 3);
        let map: SeenMap = (0..10).map(|i| (format!("k{i}"), i as i64)).collect();

        let kept = t.persist(&store, &map, 9);
        let written: SeenMap = store.get("seen_names").unwrap();
        assert_eq!(kept, written);
        assert_eq!(
            written.keys().cloned().collect::<Vec<_>>(),
            vec!["k7".to_string(), "k8".to_string(), "k9".to_string()]
        );
    }

    #[test]
    fn zero_ttl_expires_anything_older_than_now() {
        let t = tracker(0, 10);
        let mut map = SeenMap::new();
        SeenTracker::add(&mut map, "a", 10);
        t.prune(&mut map, 10);
        assert!(SeenTracker::has(&map, "a"));
        t.prune(&mut map, 11);
        assert!(!SeenTracker::has(&map, "a"));
    }

    #[test]
    fn recent_history_bans_only_the_window() {
        let mut recent = RecentHistory::new(2);
        for k in ["a", "b", "c", "d", "e"] {
            recent.push(k.to_string());
        }
        assert_eq!(recent.len(), 4);
        let mut bans = HashSet::new();
        recent.extend_bans(&mut bans);
        assert_eq!(bans, ["d".to_string(), "e".to_string()].into_iter().collect());
    }

    #[test]
    fn empty_recent_history_bans_nothing() {
        let mut recent = RecentHistory::new(0);
        recent.push("a".to_string());
        assert_eq!(recent.len(), 0);
        assert_eq!(recent.recent().count(), 0);
    }

    #[quickcheck]
    fn merge_is_commutative(a: SeenMap, b: SeenMap) -> bool {
        merged(&a, &b) == merged(&b, &a)
    }

    #[quickcheck]
    fn merge_is_idempotent(a: SeenMap) -> bool {
        merged(&a, &a) == a
    }

    #[quickcheck]
    fn merge_never_regresses_a_key(a: SeenMap, b: SeenMap) -> bool {
        let m = merged(&a, &b);
        a.iter().chain(b.iter()).all(|(k, ts)| m[k] >= *ts)
    }

    #[quickcheck]
    fn truncation_keeps_exactly_the_newest(map: SeenMap, cap: u8) -> bool {
        let cap = cap as usize;
        let kept = truncate_newest(&map, cap);
        if kept.len() != map.len().min(cap) {
            return false;
        }
        let oldest_kept = kept.values().min().copied();
        match oldest_kept {
            None => true,
            Some(floor) => map
                .iter()
                .filter(|(k, _)| !kept.contains_key(*k))
                .all(|(_, ts)| *ts <= floor),
        }
    }
}
