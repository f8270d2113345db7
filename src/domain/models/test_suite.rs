//! Test suites that define a candidate's fitness.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A single check applied to a generated output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Assertion {
    Contains {
        value: String,
        #[serde(default)]
        ignore_case: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    NotContains {
        value: String,
        #[serde(default)]
        ignore_case: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Equals {
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    StartsWith {
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    MaxLength {
        value: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    MinLength {
        value: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

fn contains(haystack: &str, needle: &str, ignore_case: bool) -> bool {
    if ignore_case {
        haystack.to_lowercase().contains(&needle.to_lowercase())
    } else {
        haystack.contains(needle)
    }
}

impl Assertion {
    pub fn contains(value: impl Into<String>) -> Self {
        Self::Contains {
            value: value.into(),
            ignore_case: false,
            message: None,
        }
    }

    pub fn not_contains(value: impl Into<String>) -> Self {
        Self::NotContains {
            value: value.into(),
            ignore_case: false,
            message: None,
        }
    }

    /// Check `output`. Returns the failure reason when the check does not hold.
    pub fn check(&self, output: &str) -> Option<String> {
        let (holds, default_reason, message) = match self {
            Self::Contains {
                value,
                ignore_case,
                message,
            } => (
                contains(output, value, *ignore_case),
                format!("expected output to contain '{value}'"),
                message,
            ),
            Self::NotContains {
                value,
                ignore_case,
                message,
            } => (
                !contains(output, value, *ignore_case),
                format!("expected output not to contain '{value}'"),
                message,
            ),
            Self::Equals { value, message } => (
                output.trim() == value.trim(),
                format!("expected output to equal '{value}'"),
                message,
            ),
            Self::StartsWith { value, message } => (
                output.trim_start().starts_with(value.as_str()),
                format!("expected output to start with '{value}'"),
                message,
            ),
            Self::MaxLength { value, message } => (
                output.chars().count() <= *value,
                format!("expected at most {value} characters"),
                message,
            ),
            Self::MinLength { value, message } => (
                output.chars().count() >= *value,
                format!("expected at least {value} characters"),
                message,
            ),
        };

        if holds {
            None
        } else {
            Some(message.clone().unwrap_or(default_reason))
        }
    }
}

/// One input plus the assertions its output must satisfy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    #[serde(default)]
    pub description: String,
    pub input: String,
    #[serde(default)]
    pub assertions: Vec<Assertion>,
}

impl TestCase {
    pub fn new(id: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            input: input.into(),
            assertions: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_assertion(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    /// All failure reasons for `output`, in assertion order.
    pub fn failure_reasons(&self, output: &str) -> Vec<String> {
        self.assertions
            .iter()
            .filter_map(|a| a.check(output))
            .collect()
    }
}

/// Execution defaults shared by every case of a suite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuiteDefaults {
    /// Text placed before the candidate in the system instruction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// A named, ordered collection of test cases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestSuite {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub defaults: SuiteDefaults,
    #[serde(default)]
    pub cases: Vec<TestCase>,
}

impl TestSuite {
    pub fn new(name: impl Into<String>, cases: Vec<TestCase>) -> Self {
        Self {
            name: name.into(),
            defaults: SuiteDefaults::default(),
            cases,
        }
    }

    /// A suite running `cases` with this suite's defaults.
    pub fn auxiliary(&self, name: impl Into<String>, cases: Vec<TestCase>) -> Self {
        Self {
            name: name.into(),
            defaults: self.defaults.clone(),
            cases,
        }
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

/// What the test execution capability reports for one case.
#[derive(Debug, Clone, Default)]
pub struct CaseExecution {
    pub output: String,
    pub duration: Duration,
    pub passed: bool,
    pub failure_reasons: Vec<String>,
    /// Set when the case could not run at all.
    pub system_error: Option<String>,
}

impl CaseExecution {
    pub fn system_error(message: impl Into<String>, duration: Duration) -> Self {
        Self {
            duration,
            system_error: Some(message.into()),
            ..Default::default()
        }
    }
}
