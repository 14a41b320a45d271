//! # Structured outcome at the collaborator boundary.
//!
//! Remote lookups have three outcomes, and "not found" is often an answer rather than
//! a failure. [`Lookup`] keeps the three apart so tasks decide explicitly, and the retry
//! classifier sees a typed [`TaskError::NotFound`] instead of a string to match.
//!
//! ```
//! use taskgraph::{Lookup, TaskError};
//!
//! let style: Lookup<String> = Lookup::NotFound;
//! assert_eq!(style.clone().optional(), Ok(None));
//! assert_eq!(style.require("style point"), Err(TaskError::not_found("style point")));
//! ```

use crate::error::TaskError;

/// Result of asking the collaborator for one resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lookup<T> {
    /// The resource exists.
    Found(T),
    /// The collaborator answered and the resource does not exist.
    NotFound,
    /// The collaborator could not answer.
    Error(TaskError),
}

impl<T> Lookup<T> {
    /// `Found(v)` → `Ok(v)`; `NotFound` → permanent [`TaskError::NotFound`].
    pub fn require(self, what: impl Into<String>) -> Result<T, TaskError> {
        match self {
            Lookup::Found(v) => Ok(v),
            Lookup::NotFound => Err(TaskError::not_found(what)),
            Lookup::Error(e) => Err(e),
        }
    }

    /// `NotFound` becomes `Ok(None)`; only real errors fail.
    pub fn optional(self) -> Result<Option<T>, TaskError> {
        match self {
            Lookup::Found(v) => Ok(Some(v)),
            Lookup::NotFound => Ok(None),
            Lookup::Error(e) => Err(e),
        }
    }

    /// True for `Found`.
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    /// Maps the found value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Found(v) => Lookup::Found(f(v)),
            Lookup::NotFound => Lookup::NotFound,
            Lookup::Error(e) => Lookup::Error(e),
        }
    }
}

impl<T> From<Result<Option<T>, TaskError>> for Lookup<T> {
    fn from(res: Result<Option<T>, TaskError>) -> Self {
        match res {
            Ok(Some(v)) => Lookup::Found(v),
            Ok(None) => Lookup::NotFound,
            Err(e) => Lookup::Error(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_found() {
        assert_eq!(Lookup::Found(3).require("x"), Ok(3));
    }

    #[test]
    fn test_error_passes_through() {
        let l: Lookup<u8> = Lookup::Error(TaskError::connection("refused"));
        assert_eq!(l.optional(), Err(TaskError::connection("refused")));
    }

    #[test]
    fn test_from_result_option() {
        let l: Lookup<&str> = Ok(None).into();
        assert_eq!(l, Lookup::NotFound);
        assert!(Lookup::from(Ok::<_, TaskError>(Some(1))).map(|v| v + 1).is_found());
    }
}
