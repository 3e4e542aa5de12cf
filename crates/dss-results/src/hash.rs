//! Content-based hashing for run IDs.

use dss_scenario::Scenario;
use sha2::{Digest, Sha256};

/// Run ID for a scenario on an engine backend.
///
/// Covers the scenario itself and the bytes of every redirected file, so an
/// edited netlist gives a new run. Unreadable files contribute their path
/// only.
pub fn compute_run_id(scenario: &Scenario, engine_tag: &str) -> String {
    let mut hasher = Sha256::new();

    let scenario_json = dss_scenario::to_canonical_json(scenario).unwrap_or_default();
    hasher.update(scenario_json.as_bytes());

    for redirect in &scenario.redirects {
        match std::fs::read(redirect) {
            Ok(bytes) => hasher.update(&bytes),
            Err(_) => hasher.update(redirect.to_string_lossy().as_bytes()),
        }
    }

    hasher.update(engine_tag.as_bytes());

    let result = hasher.finalize();
    format!("{:x}", result)
}
