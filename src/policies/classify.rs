//! # Transient vs. permanent failure classification.
//!
//! After a failed try the node asks an [`ErrorClassifier`] whether retrying can change
//! the outcome. The structural part comes from the [`TaskError`] variant; for plain
//! [`TaskError::Fail`] messages the default [`SignatureClassifier`] scans a deny-list of
//! known-unfixable conditions.
//!
//! ```text
//! Connection ───────────────────────────► Retry      (deny-list skipped)
//! NotFound / Fatal / Panicked ──────────► Permanent
//! Fail(msg) ── msg ∋ signature? ── yes ─► Permanent
//!                                └─ no ─► Retry
//! ```

use crate::error::TaskError;

/// Signatures treated as permanent by [`SignatureClassifier::default`].
pub const DEFAULT_PERMANENT_SIGNATURES: &[&str] = &[
    "could not find layer",
    "unknown layer",
    "unsupported style",
    "forbidden",
    "access denied",
    "not authorized",
];

/// Outcome of classifying a failed try.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Put the task back for another attempt while budget remains.
    Retry,
    /// Force the attempt budget to zero; the task fails now.
    Permanent,
}

/// Decides whether a failed try is worth repeating.
///
/// Called from worker threads; implementations must be cheap and thread-safe.
pub trait ErrorClassifier: Send + Sync + 'static {
    /// Classifies `err`.
    fn classify(&self, err: &TaskError) -> Disposition;
}

impl<F> ErrorClassifier for F
where
    F: Fn(&TaskError) -> Disposition + Send + Sync + 'static,
{
    fn classify(&self, err: &TaskError) -> Disposition {
        self(err)
    }
}

/// Deny-list classifier matching case-insensitive message substrings.
#[derive(Clone, Debug)]
pub struct SignatureClassifier {
    signatures: Vec<String>,
}

impl Default for SignatureClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_PERMANENT_SIGNATURES.iter().copied())
    }
}

impl SignatureClassifier {
    /// Creates a classifier with exactly the given signatures.
    pub fn new<I, S>(signatures: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            signatures: signatures
                .into_iter()
                .map(|s| s.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Adds one more permanent signature.
    pub fn with_signature(mut self, signature: impl AsRef<str>) -> Self {
        self.signatures.push(signature.as_ref().to_lowercase());
        self
    }

    /// Returns the lower-cased signatures.
    pub fn signatures(&self) -> &[String] {
        &self.signatures
    }

    fn matches(&self, message: &str) -> bool {
        let message = message.to_lowercase();
        self.signatures.iter().any(|sig| message.contains(sig))
    }
}

impl ErrorClassifier for SignatureClassifier {
    fn classify(&self, err: &TaskError) -> Disposition {
        if !err.is_retryable() {
            return Disposition::Permanent;
        }
        match err {
            TaskError::Fail { error } if self.matches(error) => Disposition::Permanent,
            _ => Disposition::Retry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_always_retries() {
        let c = SignatureClassifier::default();
        // Even a deny-listed message stays transient when it is a connection error.
        let err = TaskError::connection("forbidden by proxy, connection reset");
        assert_eq!(c.classify(&err), Disposition::Retry);
    }

    #[test]
    fn test_signature_is_case_insensitive() {
        let c = SignatureClassifier::default();
        let err = TaskError::fail("Could Not Find Layer topp:states");
        assert_eq!(c.classify(&err), Disposition::Permanent);
    }

    #[test]
    fn test_plain_failure_retries() {
        let c = SignatureClassifier::default();
        assert_eq!(
            c.classify(&TaskError::fail("502 bad gateway")),
            Disposition::Retry
        );
    }

    #[test]
    fn test_structural_permanent_variants() {
        let c = SignatureClassifier::new(Vec::<String>::new());
        assert_eq!(c.classify(&TaskError::fatal("x")), Disposition::Permanent);
        assert_eq!(c.classify(&TaskError::not_found("x")), Disposition::Permanent);
        assert_eq!(
            c.classify(&TaskError::Panicked { info: "x".into() }),
            Disposition::Permanent
        );
    }

    #[test]
    fn test_custom_signature() {
        let c = SignatureClassifier::new(["quota exceeded"]).with_signature("READ ONLY");
        assert_eq!(
            c.classify(&TaskError::fail("store is read only")),
            Disposition::Permanent
        );
        assert_eq!(
            c.classify(&TaskError::fail("could not find layer a")),
            Disposition::Retry
        );
    }

    #[test]
    fn test_empty_deny_list_follows_is_retryable() {
        let c = SignatureClassifier::new(Vec::<String>::new());
        let errors = [
            TaskError::connection("reset"),
            TaskError::fail("could not find layer a"),
            TaskError::not_found("layer a"),
            TaskError::fatal("bad request"),
            TaskError::Panicked { info: "x".into() },
        ];
        for err in &errors {
            let expected = if err.is_retryable() {
                Disposition::Retry
            } else {
                Disposition::Permanent
            };
            assert_eq!(c.classify(err), expected, "{err}");
        }
    }

    #[test]
    fn test_closure_classifier() {
        let c = |_: &TaskError| Disposition::Permanent;
        assert_eq!(c.classify(&TaskError::connection("x")), Disposition::Permanent);
    }
}
