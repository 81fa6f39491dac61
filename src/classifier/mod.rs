//! Remote LLM classification and its deterministic fallback.
//!
//! [`RemoteClassifier`] is the only component that talks to the language
//! model service. It never retries: every failure mode maps to a
//! [`ClassifierError`] variant and the resolver downgrades to the
//! [`heuristic`] classifier instead.

pub mod gemini;
pub mod heuristic;
pub mod prompt;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::models::{coerce_category, Category, CategorySet, TabDescriptor};
use crate::rate_limit::FixedWindowLimiter;

pub use gemini::GeminiClient;

/// Classification-path failures. All of these are absorbed by the resolver
/// and downgraded to a heuristic result — they never reach the caller.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("No classifier API key configured")]
    MissingApiKey,
    #[error("Rate limit window exhausted")]
    RateLimited,
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Classifier API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Response not coercible to a known category: {0:?}")]
    InvalidResponse(String),
}

/// Text-generation backend behind the remote classifier. One production
/// implementation ([`GeminiClient`]) plus [`MockLlmBackend`] for tests.
pub trait LlmBackend: Send + Sync {
    /// Run one classification prompt and return the raw model answer.
    fn generate(&self, prompt: &str) -> Result<String, ClassifierError>;

    /// Whether a credential is present. Checked before every call so the
    /// keyless path never reaches the network.
    fn is_configured(&self) -> bool;
}

impl<T: LlmBackend + ?Sized> LlmBackend for Arc<T> {
    fn generate(&self, prompt: &str) -> Result<String, ClassifierError> {
        (**self).generate(prompt)
    }

    fn is_configured(&self) -> bool {
        (**self).is_configured()
    }
}

/// Run one diagnostic classification against `backend`, bypassing the shared
/// rate-limit window and without touching any configured classifier.
///
/// Used to vet a candidate API key before it is adopted: the fixture page is
/// a stable, well-known development site, so a working credential comes back
/// with a sensible category and a bad one surfaces its real error.
pub fn verify_backend(
    backend: &dyn LlmBackend,
    categories: &CategorySet,
) -> Result<Category, ClassifierError> {
    if !backend.is_configured() {
        return Err(ClassifierError::MissingApiKey);
    }

    let fixture = TabDescriptor::new(crate::models::TabId(0), "https://github.com", "GitHub")
        .with_content("GitHub is a development platform");
    let prompt = prompt::build_prompt(&fixture, categories);
    let raw = backend.generate(&prompt)?;

    coerce_category(&raw).ok_or(ClassifierError::InvalidResponse(raw))
}

// ═══════════════════════════════════════════════════════════
// RemoteClassifier
// ═══════════════════════════════════════════════════════════

/// Rate-limited remote classifier client.
pub struct RemoteClassifier {
    backend: Box<dyn LlmBackend>,
    limiter: Arc<FixedWindowLimiter>,
    categories: CategorySet,
}

impl RemoteClassifier {
    pub fn new(
        backend: Box<dyn LlmBackend>,
        limiter: Arc<FixedWindowLimiter>,
        categories: CategorySet,
    ) -> Self {
        Self {
            backend,
            limiter,
            categories,
        }
    }

    /// Swap the generation backend, e.g. after the user supplies or clears
    /// an API key. The rate-limit window carries over.
    pub fn set_backend(&mut self, backend: Box<dyn LlmBackend>) {
        self.backend = backend;
    }

    /// Replace the category set used for prompting and coercion.
    pub fn set_categories(&mut self, categories: CategorySet) {
        self.categories = categories;
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_configured()
    }

    /// Classify one tab via the remote service.
    ///
    /// Consumes exactly one rate-limiter slot per admitted attempt. The raw
    /// answer is coerced against the known category set; an answer that
    /// survives no coercion is `InvalidResponse`.
    pub fn classify(&self, descriptor: &TabDescriptor) -> Result<Category, ClassifierError> {
        if !self.backend.is_configured() {
            return Err(ClassifierError::MissingApiKey);
        }
        if !self.limiter.try_acquire() {
            tracing::debug!(url = %descriptor.url, "rate limited, remote classification denied");
            return Err(ClassifierError::RateLimited);
        }

        let prompt = prompt::build_prompt(descriptor, &self.categories);
        let raw = self.backend.generate(&prompt)?;

        match coerce_category(&raw) {
            Some(category) => {
                tracing::debug!(url = %descriptor.url, %category, "remote classification succeeded");
                Ok(category)
            }
            None => Err(ClassifierError::InvalidResponse(raw)),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Mock backend
// ═══════════════════════════════════════════════════════════

/// Mock backend for testing — configurable answer, failure, or keyless state,
/// with a call counter for no-network assertions.
pub struct MockLlmBackend {
    response: String,
    configured: bool,
    fail_transport: bool,
    delay: Option<std::time::Duration>,
    calls: AtomicUsize,
}

impl MockLlmBackend {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            configured: true,
            fail_transport: false,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Backend with no credential configured.
    pub fn unconfigured() -> Self {
        let mut mock = Self::new("");
        mock.configured = false;
        mock
    }

    /// Backend whose every call fails at the transport layer.
    pub fn failing() -> Self {
        let mut mock = Self::new("");
        mock.fail_transport = true;
        mock
    }

    /// Backend that sleeps for `delay` before answering, standing in for a
    /// slow remote service.
    pub fn slow(response: &str, delay: std::time::Duration) -> Self {
        let mut mock = Self::new(response);
        mock.delay = Some(delay);
        mock
    }

    /// Number of generate() calls made against this backend.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl LlmBackend for MockLlmBackend {
    fn generate(&self, _prompt: &str) -> Result<String, ClassifierError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.fail_transport {
            return Err(ClassifierError::Http("mock transport failure".to_string()));
        }
        Ok(self.response.clone())
    }

    fn is_configured(&self) -> bool {
        self.configured
    }
}
