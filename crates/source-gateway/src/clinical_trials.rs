use opportunity_core::{SourceError, TrialData};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::{http_client, read_json, request_error};

const PAGE_SIZE: &str = "100";

#[derive(Debug, Deserialize)]
struct StudiesResponse {
    #[serde(default)]
    studies: Vec<Value>,
}

/// ClinicalTrials.gov v2 client counting phase 2/3 studies located in one country
#[derive(Clone)]
pub struct ClinicalTrialsClient {
    client: Client,
    base_url: String,
    country: String,
    timeout: Duration,
}

impl ClinicalTrialsClient {
    pub fn new(base_url: impl Into<String>, country: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            country: country.into(),
            timeout,
        }
    }

    /// Fetch the first page of studies for `disease` and count those in the target country
    pub async fn trial_data(&self, disease: &str) -> Result<TrialData, SourceError> {
        let url = format!("{}/studies", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("query.term", disease), ("pageSize", PAGE_SIZE)])
            .send()
            .await
            .map_err(|e| request_error(e, self.timeout))?;

        let body: StudiesResponse = read_json(response).await?;
        tracing::debug!(
            "ClinicalTrials.gov returned {} studies for {}",
            body.studies.len(),
            disease
        );
        Ok(count_trials(&body.studies, &self.country))
    }
}

/// Count studies with a location in `country`, by phase
pub(crate) fn count_trials(studies: &[Value], country: &str) -> TrialData {
    let mut counts = TrialData::default();
    for study in studies.iter().filter(|s| located_in(s, country)) {
        counts.total_count += 1;
        let phases = phases(study);
        if phases.iter().any(|p| p == "phase2") {
            counts.phase2_count += 1;
        }
        if phases.iter().any(|p| p == "phase3") {
            counts.phase3_count += 1;
        }
    }
    counts
}

fn located_in(study: &Value, country: &str) -> bool {
    let locations = study
        .pointer("/protocolSection/contactsLocationsModule/locations")
        .and_then(|v| v.as_array());
    let Some(locations) = locations else {
        return false;
    };
    locations.iter().any(|loc| {
        // v2 puts the country on the location; older payloads nest it under an address
        let found = loc
            .get("country")
            .or_else(|| loc.pointer("/location/address/country"))
            .and_then(|c| c.as_str());
        found.is_some_and(|c| c.eq_ignore_ascii_case(country))
    })
}

/// Phases normalized to `phaseN` ("PHASE2", "Phase 2" and "phase_2" all match)
fn phases(study: &Value) -> Vec<String> {
    study
        .pointer("/protocolSection/designModule/phases")
        .and_then(|v| v.as_array())
        .map(|phases| {
            phases
                .iter()
                .filter_map(|p| p.as_str())
                .map(|p| {
                    p.chars()
                        .filter(|c| c.is_ascii_alphanumeric())
                        .collect::<String>()
                        .to_ascii_lowercase()
                })
                .collect()
        })
        .unwrap_or_default()
}
