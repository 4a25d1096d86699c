use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{SegmentStore, sort_segments};
use crate::model::{Segment, SegmentKey};

/// In-process store; each key maps to an immutable snapshot that is swapped whole.
#[derive(Default)]
pub struct MemoryStore {
    sets: RwLock<HashMap<SegmentKey, Arc<[Segment]>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the set for `key` without copying the records.
    pub async fn snapshot(&self, key: &SegmentKey) -> Option<Arc<[Segment]>> {
        self.sets.read().await.get(key).cloned()
    }
}

#[async_trait::async_trait]
impl SegmentStore for MemoryStore {
    async fn replace(&self, key: &SegmentKey, mut segments: Vec<Segment>) -> Result<()> {
        sort_segments(&mut segments);
        let snapshot: Arc<[Segment]> = segments.into();
        self.sets.write().await.insert(key.clone(), snapshot);
        Ok(())
    }

    async fn segments(&self, key: &SegmentKey) -> Result<Vec<Segment>> {
        Ok(self
            .snapshot(key)
            .await
            .map(|set| set.to_vec())
            .unwrap_or_default())
    }

    async fn keys(&self) -> Result<Vec<SegmentKey>> {
        let mut keys: Vec<_> = self.sets.read().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Endpoint, PerClass};
    use chrono::{NaiveDate, NaiveTime, Utc};
    use rust_decimal::Decimal;

    fn segment(id: i64, origin: u32, destination: u32) -> Segment {
        let endpoint = |index| Endpoint {
            index,
            name: format!("S{index}"),
            name_pinyin: format!("s{index}"),
            time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        };
        Segment {
            id,
            date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            train_code: "G1".to_string(),
            origin: endpoint(origin),
            destination: endpoint(destination),
            distance_km: Decimal::ONE,
            seats: PerClass::default(),
            fares: PerClass::default(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_replace_swaps_whole_set() {
        let store = MemoryStore::new();
        let key = segment(0, 0, 1).key();

        store
            .replace(&key, vec![segment(1, 0, 1), segment(2, 0, 2), segment(3, 1, 2)])
            .await
            .unwrap();
        store.replace(&key, vec![segment(4, 0, 1)]).await.unwrap();

        let stored = store.segments(&key).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, 4);
    }

    #[tokio::test]
    async fn test_segments_are_ordered() {
        let store = MemoryStore::new();
        let key = segment(0, 0, 1).key();
        store
            .replace(&key, vec![segment(1, 1, 2), segment(2, 0, 2), segment(3, 0, 1)])
            .await
            .unwrap();

        let pairs: Vec<_> = store
            .segments(&key)
            .await
            .unwrap()
            .iter()
            .map(|s| (s.origin.index, s.destination.index))
            .collect();
        assert_eq!(pairs, vec![(0, 1), (0, 2), (1, 2)]);
    }

    #[tokio::test]
    async fn test_unknown_key_is_empty() {
        let store = MemoryStore::new();
        let key = SegmentKey::new(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(), "K9");
        assert!(store.segments(&key).await.unwrap().is_empty());
        assert!(store.keys().await.unwrap().is_empty());
    }
}
