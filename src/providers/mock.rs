use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::base::Provider;
use crate::errors::{Result, TutorError};

/// A mock provider that returns pre-configured responses for testing.
/// Responses are consumed in order; once exhausted every call fails with a
/// gateway error, which doubles as the failure-injection mechanism.
pub struct MockProvider {
    responses: Arc<Mutex<Vec<Result<String>>>>,
}

impl MockProvider {
    /// Create a mock that yields each response text in sequence.
    pub fn new<S: Into<String>>(responses: Vec<S>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(
                responses.into_iter().map(|s| Ok(s.into())).collect(),
            )),
        }
    }

    /// Create a mock from a sequence of full results, so tests can
    /// interleave gateway failures with successes.
    pub fn with_results(responses: Vec<Result<String>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
        }
    }

    /// A mock whose every call fails, for exercising error paths.
    pub fn always_failing() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn generate(&self, _model: &str, _prompt: &str) -> Result<String> {
        let mut responses = self.responses.lock().unwrap_or_else(|e| e.into_inner());
        if responses.is_empty() {
            Err(TutorError::Gateway("mock provider exhausted".to_string()))
        } else {
            responses.remove(0)
        }
    }
}
