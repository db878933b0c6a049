use opportunity_core::normalize::{first_non_finite, min_max_normalize};
use opportunity_core::{MetricRecord, ScoredRecord, ScoringError};

/// Score given to every candidate when scoring cannot be computed
pub const NEUTRAL_SCORE: f64 = 0.5;

fn check_finite(field: &'static str, records: &[MetricRecord], values: &[f64]) -> Result<(), ScoringError> {
    match first_non_finite(values) {
        Some(i) => Err(ScoringError::NonFinite {
            field,
            disease: records[i].disease().to_string(),
        }),
        None => Ok(()),
    }
}

/// `normalized burden - normalized competition pressure`, one score per record
pub fn try_score(records: &[MetricRecord]) -> Result<Vec<ScoredRecord>, ScoringError> {
    let burden: Vec<f64> = records.iter().map(MetricRecord::market_size).collect();
    let competition: Vec<f64> = records
        .iter()
        .map(MetricRecord::competition_pressure)
        .collect();
    check_finite("market_size", records, &burden)?;
    check_finite("competition_pressure", records, &competition)?;

    let burden = min_max_normalize(&burden);
    let competition = min_max_normalize(&competition);

    let scores: Vec<f64> = burden
        .iter()
        .zip(&competition)
        .map(|(b, c)| b - c)
        .collect();
    check_finite("score", records, &scores)?;

    Ok(records
        .iter()
        .zip(scores)
        .map(|(record, score)| ScoredRecord {
            record: record.clone(),
            score,
        })
        .collect())
}

/// Like [`try_score`], but falls back to [`NEUTRAL_SCORE`] for every record
pub fn score(records: &[MetricRecord]) -> Vec<ScoredRecord> {
    match try_score(records) {
        Ok(scored) => scored,
        Err(e) => {
            tracing::warn!("Scoring failed, assigning neutral scores: {}", e);
            records
                .iter()
                .map(|record| ScoredRecord {
                    record: record.clone(),
                    score: NEUTRAL_SCORE,
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opportunity_core::{MarketData, PatentData, TradeData, TrialData};

    fn record(name: &str, market_size: f64, competitors: u32, phase2: u32, phase3: u32) -> MetricRecord {
        MetricRecord::from_sources(
            name,
            MarketData {
                market_size,
                competitor_count: competitors,
            },
            TradeData::default(),
            PatentData::default(),
            TrialData {
                phase2_count: phase2,
                phase3_count: phase3,
                total_count: phase2 + phase3,
            },
        )
    }

    #[test]
    fn test_constant_competition() {
        let records = vec![
            record("A", 100.0, 10, 0, 0),
            record("B", 200.0, 4, 3, 3),
            record("C", 300.0, 8, 2, 0),
        ];
        let scores: Vec<f64> = score(&records).iter().map(|s| s.score).collect();
        assert_eq!(scores, vec![-0.5, 0.0, 0.5]);
    }

    #[test]
    fn test_high_burden_low_competition_wins() {
        let records = vec![
            record("Crowded", 1000.0, 20, 5, 5),
            record("Open", 1000.0, 1, 0, 0),
        ];
        let scored = score(&records);
        assert!(scored[1].score > scored[0].score);
        assert_eq!(scored[1].score, 0.5 - 0.0);
    }

    #[test]
    fn test_single_candidate_scores_zero() {
        let scored = score(&[record("Only", 42.0, 3, 1, 1)]);
        assert_eq!(scored[0].score, 0.0);
    }

    #[test]
    fn test_idempotent() {
        let records = vec![
            record("A", 1.2e9, 18, 2, 1),
            record("B", 9e8, 14, 0, 4),
            record("C", 3e8, 6, 1, 0),
        ];
        let first = score(&records);
        let second = score(&records);
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.score.to_bits(), b.score.to_bits());
        }
        assert!(first.iter().all(|s| s.score.is_finite()));
    }

    #[test]
    fn test_non_finite_falls_back_to_neutral() {
        let records = vec![record("A", f64::NAN, 1, 0, 0), record("B", 10.0, 2, 0, 0)];
        assert!(matches!(
            try_score(&records),
            Err(ScoringError::NonFinite { field: "market_size", .. })
        ));
        let scored = score(&records);
        assert!(scored.iter().all(|s| s.score == NEUTRAL_SCORE));
        assert_eq!(scored[0].disease(), "A");
    }

    #[test]
    fn test_failed_records_are_scored() {
        let records = vec![record("A", 500.0, 2, 0, 0), MetricRecord::failed("B", "down")];
        let scored = score(&records);
        assert_eq!(scored.len(), 2);
        assert!(scored[1].record.is_failed());
    }

    #[test]
    fn test_empty() {
        assert!(score(&[]).is_empty());
    }
}
