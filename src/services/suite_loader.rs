//! Loads test suites from YAML or JSON files.

use std::collections::HashSet;
use std::path::Path;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::TestSuite;

/// Read and validate a suite file. `.json` files are parsed as JSON,
/// everything else as YAML.
pub fn load_suite(path: &Path) -> DomainResult<TestSuite> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        DomainError::Configuration(format!("cannot read suite {}: {e}", path.display()))
    })?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let mut suite = if is_json {
        serde_json::from_str::<TestSuite>(&content).map_err(|e| {
            DomainError::Configuration(format!("invalid suite {}: {e}", path.display()))
        })?
    } else {
        parse_suite_yaml(&content).map_err(|e| match e {
            DomainError::Configuration(msg) => {
                DomainError::Configuration(format!("invalid suite {}: {msg}", path.display()))
            }
            other => other,
        })?
    };

    if suite.name.is_empty() {
        suite.name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("suite")
            .to_string();
    }

    check_suite(&suite)?;
    Ok(suite)
}

/// Parse a suite from YAML text.
pub fn parse_suite_yaml(content: &str) -> DomainResult<TestSuite> {
    serde_yaml::from_str(content).map_err(|e| DomainError::Configuration(e.to_string()))
}

/// Reject suites that cannot be scored meaningfully.
pub fn check_suite(suite: &TestSuite) -> DomainResult<()> {
    if suite.is_empty() {
        return Err(DomainError::Configuration(format!(
            "suite '{}' has no cases",
            suite.name
        )));
    }

    let mut seen = HashSet::new();
    for case in &suite.cases {
        if case.id.trim().is_empty() {
            return Err(DomainError::Configuration(format!(
                "suite '{}' has a case without an id",
                suite.name
            )));
        }
        if !seen.insert(case.id.as_str()) {
            return Err(DomainError::Configuration(format!(
                "suite '{}' has duplicate case id '{}'",
                suite.name, case.id
            )));
        }
    }
    Ok(())
}
