use opportunity_core::ScoredRecord;

/// Highest score first. The sort is stable, so ties keep their input order.
pub fn rank(mut scored: Vec<ScoredRecord>) -> Vec<ScoredRecord> {
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored
}
