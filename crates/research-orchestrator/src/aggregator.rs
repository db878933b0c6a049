use opportunity_core::{MetricRecord, MetricSource, PipelineError, SourceError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::AggregatorConfig;

#[derive(Debug)]
enum PoolUnavailable {
    NoRuntime(String),
    NoWorkers,
}

impl std::fmt::Display for PoolUnavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolUnavailable::NoRuntime(e) => write!(f, "no async runtime: {}", e),
            PoolUnavailable::NoWorkers => write!(f, "worker bound is zero"),
        }
    }
}

/// Gathers one metric record per candidate, fanning out across a bounded pool
pub struct Aggregator {
    source: Arc<dyn MetricSource>,
    config: AggregatorConfig,
}

impl Aggregator {
    pub fn new(source: Arc<dyn MetricSource>, config: AggregatorConfig) -> Self {
        Self { source, config }
    }

    /// One record per candidate, in candidate order.
    ///
    /// Unit failures become failed records; only an empty input or a batch where
    /// every unit failed is an error.
    pub async fn aggregate(&self, candidates: &[String]) -> Result<Vec<MetricRecord>, PipelineError> {
        if candidates.is_empty() {
            return Err(PipelineError::NoDataCollected(
                "no candidates to aggregate".to_string(),
            ));
        }

        let records = match self.fan_out(candidates).await {
            Ok(records) => records,
            Err(reason) => {
                tracing::warn!("Worker pool unavailable ({}), gathering sequentially", reason);
                self.sequential(candidates).await
            }
        };

        let failed = records.iter().filter(|r| r.is_failed()).count();
        if failed == records.len() {
            return Err(PipelineError::AggregationExhausted(records.len()));
        }
        if failed > 0 {
            tracing::warn!("{} of {} candidates have no data", failed, records.len());
        }
        tracing::info!("Aggregated metrics for {} candidates", records.len());
        Ok(records)
    }

    async fn fan_out(&self, candidates: &[String]) -> Result<Vec<MetricRecord>, PoolUnavailable> {
        tokio::runtime::Handle::try_current()
            .map_err(|e| PoolUnavailable::NoRuntime(e.to_string()))?;
        let workers = self.config.max_workers.min(candidates.len());
        if workers == 0 {
            return Err(PoolUnavailable::NoWorkers);
        }

        let permits = Arc::new(Semaphore::new(workers));
        let mut tasks = JoinSet::new();

        for disease in candidates {
            let permits = Arc::clone(&permits);
            let source = Arc::clone(&self.source);
            let disease = disease.clone();
            let timeout = self.config.unit_timeout;

            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                // Inner set so a panic surfaces as a JoinError we can attribute, and
                // dropping this task aborts the unit with it
                let mut unit = JoinSet::new();
                unit.spawn(timed_unit(source, disease.clone(), timeout));
                let record = match unit.join_next().await {
                    Some(Ok(record)) => record,
                    Some(Err(e)) => {
                        tracing::warn!("Unit for {} aborted: {}", disease, e);
                        MetricRecord::failed(&disease, format!("worker failed: {}", e))
                    }
                    None => MetricRecord::failed(&disease, "worker lost before reporting"),
                };
                (disease, record)
            });
        }

        // Completion order; re-associated by name below
        let mut by_name: HashMap<String, MetricRecord> = HashMap::with_capacity(candidates.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((disease, record)) => {
                    by_name.insert(disease, record);
                }
                Err(e) => tracing::warn!("Aggregation task lost: {}", e),
            }
        }

        Ok(candidates
            .iter()
            .map(|disease| {
                by_name.get(disease).cloned().unwrap_or_else(|| {
                    MetricRecord::failed(disease, "worker lost before reporting")
                })
            })
            .collect())
    }

    async fn sequential(&self, candidates: &[String]) -> Vec<MetricRecord> {
        let timed = tokio::runtime::Handle::try_current().is_ok();
        let mut records = Vec::with_capacity(candidates.len());
        for disease in candidates {
            let record = if timed {
                timed_unit(Arc::clone(&self.source), disease.clone(), self.config.unit_timeout)
                    .await
            } else {
                into_record(disease, gather(self.source.as_ref(), disease).await)
            };
            records.push(record);
        }
        records
    }
}

/// All four sources for one candidate; the first failure fails the unit
async fn gather(source: &dyn MetricSource, disease: &str) -> Result<MetricRecord, SourceError> {
    let market = source.market_data(disease).await?;
    let trade = source.trade_data(disease).await?;
    let patents = source.patent_data(disease).await?;
    let trials = source.trial_data(disease).await?;
    Ok(MetricRecord::from_sources(disease, market, trade, patents, trials))
}

async fn timed_unit(source: Arc<dyn MetricSource>, disease: String, timeout: Duration) -> MetricRecord {
    let result = match tokio::time::timeout(timeout, gather(source.as_ref(), &disease)).await {
        Ok(result) => result,
        Err(_) => Err(SourceError::Timeout(timeout)),
    };
    into_record(&disease, result)
}

fn into_record(disease: &str, result: Result<MetricRecord, SourceError>) -> MetricRecord {
    match result {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!("Data gathering failed for {}: {}", disease, e);
            MetricRecord::failed(disease, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use opportunity_core::{MarketData, PatentData, TradeData, TrialData};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct StubSource {
        fail: Option<&'static str>,
        slow: Option<&'static str>,
        panic_on: Option<&'static str>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl MetricSource for StubSource {
        async fn market_data(&self, disease: &str) -> Result<MarketData, SourceError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.panic_on == Some(disease) {
                panic!("registry exploded");
            }
            if self.slow == Some(disease) {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            if self.fail == Some(disease) {
                return Err(SourceError::Unavailable("registry down".to_string()));
            }
            Ok(MarketData {
                market_size: disease.len() as f64 * 100.0,
                competitor_count: 3,
            })
        }

        async fn trade_data(&self, _disease: &str) -> Result<TradeData, SourceError> {
            Ok(TradeData::default())
        }

        async fn patent_data(&self, _disease: &str) -> Result<PatentData, SourceError> {
            Ok(PatentData::default())
        }

        async fn trial_data(&self, _disease: &str) -> Result<TrialData, SourceError> {
            Ok(TrialData {
                phase2_count: 1,
                phase3_count: 1,
                total_count: 4,
            })
        }
    }

    struct DropCounter(Arc<AtomicUsize>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Market data never arrives; counts units torn down mid-flight
    #[derive(Default)]
    struct HangingSource {
        dropped: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl MetricSource for HangingSource {
        async fn market_data(&self, _disease: &str) -> Result<MarketData, SourceError> {
            let _guard = DropCounter(Arc::clone(&self.dropped));
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(MarketData::default())
        }

        async fn trade_data(&self, _disease: &str) -> Result<TradeData, SourceError> {
            Ok(TradeData::default())
        }

        async fn patent_data(&self, _disease: &str) -> Result<PatentData, SourceError> {
            Ok(PatentData::default())
        }

        async fn trial_data(&self, _disease: &str) -> Result<TrialData, SourceError> {
            Ok(TrialData::default())
        }
    }

    fn candidates(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("D{}", i)).collect()
    }

    fn aggregator(source: StubSource, config: AggregatorConfig) -> (Aggregator, Arc<StubSource>) {
        let source = Arc::new(source);
        (Aggregator::new(source.clone(), config), source)
    }

    #[tokio::test]
    async fn test_one_failure_is_isolated() {
        let (agg, _) = aggregator(
            StubSource {
                fail: Some("D3"),
                ..Default::default()
            },
            AggregatorConfig::default(),
        );
        let records = agg.aggregate(&candidates(5)).await.unwrap();

        assert_eq!(records.len(), 5);
        let order: Vec<_> = records.iter().map(|r| r.disease().to_string()).collect();
        assert_eq!(order, candidates(5));
        assert!(records[2].is_failed());
        assert_eq!(records[2].market_size(), 0.0);
        assert_eq!(records.iter().filter(|r| r.is_failed()).count(), 1);
        assert_eq!(records[0].phase2_trial_count(), 1);
    }

    #[tokio::test]
    async fn test_timeout_fails_only_that_unit() {
        let (agg, _) = aggregator(
            StubSource {
                slow: Some("D2"),
                ..Default::default()
            },
            AggregatorConfig {
                max_workers: 5,
                unit_timeout: Duration::from_millis(200),
            },
        );
        let records = agg.aggregate(&candidates(3)).await.unwrap();
        assert!(records[1].is_failed());
        assert!(records[1].error().unwrap().contains("Timed out"));
        assert!(!records[0].is_failed());
        assert!(!records[2].is_failed());
    }

    #[tokio::test]
    async fn test_panicking_unit_becomes_failed_record() {
        let (agg, _) = aggregator(
            StubSource {
                panic_on: Some("D1"),
                ..Default::default()
            },
            AggregatorConfig::default(),
        );
        let records = agg.aggregate(&candidates(2)).await.unwrap();
        assert_eq!(records[0].disease(), "D1");
        assert!(records[0].is_failed());
        assert!(!records[1].is_failed());
    }

    #[tokio::test]
    async fn test_dropping_aggregate_aborts_running_units() {
        let source = Arc::new(HangingSource::default());
        let dropped = Arc::clone(&source.dropped);
        let agg = Aggregator::new(
            source,
            AggregatorConfig {
                max_workers: 5,
                unit_timeout: Duration::from_secs(120),
            },
        );

        let names = candidates(2);
        let cancelled = tokio::time::timeout(Duration::from_millis(200), agg.aggregate(&names)).await;
        assert!(cancelled.is_err());

        for _ in 0..100 {
            if dropped.load(Ordering::SeqCst) == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(dropped.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_worker_bound_is_respected() {
        let (agg, source) = aggregator(
            StubSource::default(),
            AggregatorConfig {
                max_workers: 2,
                unit_timeout: Duration::from_secs(5),
            },
        );
        agg.aggregate(&candidates(6)).await.unwrap();
        assert!(source.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_zero_workers_runs_sequentially() {
        let (agg, source) = aggregator(
            StubSource {
                fail: Some("D2"),
                ..Default::default()
            },
            AggregatorConfig {
                max_workers: 0,
                unit_timeout: Duration::from_secs(5),
            },
        );
        let records = agg.aggregate(&candidates(3)).await.unwrap();
        assert_eq!(records.len(), 3);
        assert!(records[1].is_failed());
        assert_eq!(source.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_input_is_no_data() {
        let (agg, _) = aggregator(StubSource::default(), AggregatorConfig::default());
        let err = agg.aggregate(&[]).await.unwrap_err();
        assert_eq!(err.category(), "no_data_collected");
    }

    #[tokio::test]
    async fn test_all_failed_is_exhausted() {
        let (agg, _) = aggregator(
            StubSource {
                fail: Some("D1"),
                ..Default::default()
            },
            AggregatorConfig::default(),
        );
        let err = agg.aggregate(&candidates(1)).await.unwrap_err();
        assert_eq!(err, PipelineError::AggregationExhausted(1));
    }
}
