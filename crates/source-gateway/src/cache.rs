use dashmap::DashMap;
use opportunity_core::{MarketData, PatentData, TradeData, TrialData};

pub const DEFAULT_CAPACITY: usize = 256;

/// Which feed a cached value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Market,
    Trade,
    Patent,
    Trial,
}

#[derive(Debug, Clone)]
pub enum CachedMetric {
    Market(MarketData),
    Trade(TradeData),
    Patent(PatentData),
    Trial(TrialData),
}

/// Source payloads that can live in the [`SourceCache`]
pub trait Cacheable: Clone + Sized {
    const KIND: SourceKind;

    fn into_cached(self) -> CachedMetric;

    fn from_cached(cached: &CachedMetric) -> Option<Self>;
}

macro_rules! cacheable {
    ($ty:ty, $variant:ident) => {
        impl Cacheable for $ty {
            const KIND: SourceKind = SourceKind::$variant;

            fn into_cached(self) -> CachedMetric {
                CachedMetric::$variant(self)
            }

            fn from_cached(cached: &CachedMetric) -> Option<Self> {
                match cached {
                    CachedMetric::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

cacheable!(MarketData, Market);
cacheable!(TradeData, Trade);
cacheable!(PatentData, Patent);
cacheable!(TrialData, Trial);

/// Bounded memo of successful source calls, keyed by source and disease.
///
/// Upstream data is read-only for the process lifetime, so entries never expire.
/// Once `capacity` entries are stored new values are simply not cached.
pub struct SourceCache {
    entries: DashMap<(SourceKind, String), CachedMetric>,
    capacity: usize,
}

impl SourceCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity,
        }
    }

    pub fn get<T: Cacheable>(&self, disease: &str) -> Option<T> {
        self.entries
            .get(&(T::KIND, disease.to_string()))
            .and_then(|entry| T::from_cached(entry.value()))
    }

    pub fn insert<T: Cacheable>(&self, disease: &str, value: T) {
        let key = (T::KIND, disease.to_string());
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            tracing::debug!("Source cache full ({} entries), not caching {:?} for {}", self.capacity, T::KIND, disease);
            return;
        }
        self.entries.insert(key, value.into_cached());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl Default for SourceCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
