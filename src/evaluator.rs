//! Shared path evaluator for hook mode and CLI.
//!
//! Both hook mode (stdin JSON) and `erg check` go through this module so they
//! always agree on the verdict.
//!
//! # Policy
//!
//! A read is denied when the candidate path contains the literal token `.env`
//! anywhere. The match is case-sensitive and ignores path boundaries, so
//! `/a/.envrc`, `foo.env.bak` and `.environment` are all denied while
//! `/x/.ENV` is allowed.
//!
//! # Example
//!
//! ```
//! use env_read_guard::evaluator::{Verdict, evaluate};
//!
//! let evaluation = evaluate(br#"{"tool_input": {"file_path": "/project/.env"}}"#).unwrap();
//! assert_eq!(evaluation.verdict, Verdict::Deny);
//! assert_eq!(evaluation.verdict.exit_code(), 2);
//! ```

use crate::hook::{DENY_EXIT_CODE, HookInput, HookReadError, PathSource};
use memchr::memmem;
use tracing::debug;

/// Token whose presence in a path marks it as an environment-secrets file.
pub const SECRET_FILE_TOKEN: &str = ".env";

/// The decision made by the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The read may proceed.
    Allow,
    /// The read is blocked.
    Deny,
}

impl Verdict {
    /// Process exit status the host expects for this verdict.
    #[must_use]
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::Allow => 0,
            Self::Deny => DENY_EXIT_CODE,
        }
    }

    /// Lowercase label for logs and JSON output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        }
    }

    #[inline]
    #[must_use]
    pub fn is_denied(self) -> bool {
        self == Self::Deny
    }
}

/// Result of evaluating one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// The verdict.
    pub verdict: Verdict,
    /// The path that was inspected (empty when the request named none).
    pub path: String,
    /// Which `tool_input` field supplied `path`.
    pub source: PathSource,
}

/// Decide whether a read of `path` is allowed.
#[inline]
#[must_use]
pub fn evaluate_path(path: &str) -> Verdict {
    if memmem::find(path.as_bytes(), SECRET_FILE_TOKEN.as_bytes()).is_some() {
        Verdict::Deny
    } else {
        Verdict::Allow
    }
}

/// Evaluate an already-decoded request.
#[must_use]
pub fn evaluate_input(input: &HookInput) -> Evaluation {
    let candidate = input.candidate_path();
    let verdict = evaluate_path(candidate.path);
    debug!(
        tool = input.tool_name.as_deref().unwrap_or("<none>"),
        path = candidate.path,
        source = candidate.source.label(),
        verdict = verdict.label(),
        "evaluated read request"
    );
    Evaluation {
        verdict,
        path: candidate.path.to_string(),
        source: candidate.source,
    }
}

/// Evaluate a raw hook payload.
///
/// # Errors
///
/// Returns the decode error when `raw` is not JSON or is `null`. Callers must
/// not turn this into either verdict.
pub fn evaluate(raw: &[u8]) -> Result<Evaluation, HookReadError> {
    let input = HookInput::from_slice(raw)?;
    Ok(evaluate_input(&input))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict_for(json: &str) -> Verdict {
        evaluate(json.as_bytes()).unwrap().verdict
    }

    #[test]
    fn test_env_file_denied() {
        assert_eq!(
            verdict_for(r#"{"tool_input":{"file_path":"/project/.env"}}"#),
            Verdict::Deny
        );
    }

    #[test]
    fn test_regular_file_allowed() {
        assert_eq!(
            verdict_for(r#"{"tool_input":{"file_path":"/project/config.json"}}"#),
            Verdict::Allow
        );
    }

    #[test]
    fn test_path_fallback_denied() {
        let evaluation = evaluate(br#"{"tool_input":{"path":"/home/user/.env.local"}}"#).unwrap();
        assert_eq!(evaluation.verdict, Verdict::Deny);
        assert_eq!(evaluation.path, "/home/user/.env.local");
        assert_eq!(evaluation.source, PathSource::Path);
    }

    #[test]
    fn test_empty_object_allowed() {
        let evaluation = evaluate(b"{}").unwrap();
        assert_eq!(evaluation.verdict, Verdict::Allow);
        assert_eq!(evaluation.path, "");
        assert_eq!(evaluation.source, PathSource::None);
    }

    #[test]
    fn test_malformed_input_is_not_a_verdict() {
        assert!(evaluate(b"not json").is_err());
        assert!(evaluate(b"").is_err());
    }

    #[test]
    fn test_file_path_precedence() {
        assert_eq!(
            verdict_for(r#"{"tool_input":{"file_path":"/tmp/safe.txt","path":"/tmp/.env"}}"#),
            Verdict::Allow
        );
        assert_eq!(
            verdict_for(r#"{"tool_input":{"file_path":"","path":"/x/.env"}}"#),
            Verdict::Deny
        );
    }

    #[test]
    fn test_match_is_case_sensitive() {
        assert_eq!(evaluate_path("/x/.ENV"), Verdict::Allow);
        assert_eq!(evaluate_path("/x/.Env"), Verdict::Allow);
    }

    #[test]
    fn test_match_ignores_path_boundaries() {
        for path in [
            ".env",
            "/a/.envrc",
            "foo.env.bak",
            "/srv/.environment",
            "my.envrc",
            "/data/barn.environs",
        ] {
            assert_eq!(evaluate_path(path), Verdict::Deny, "path: {path}");
        }
    }

    #[test]
    fn test_near_misses_allowed() {
        for path in ["", "env", "/etc/environment", "/x/_env", "/x/.en v", "/x/.e/nv"] {
            assert_eq!(evaluate_path(path), Verdict::Allow, "path: {path}");
        }
    }

    #[test]
    fn test_unknown_fields_ignored() {
        assert_eq!(
            verdict_for(
                r#"{"session_id":"s","transcript_path":{"weird":[1,2]},"tool_name":"Read","tool_input":{"file_path":"/p/.env","limit":10,"offset":null}}"#
            ),
            Verdict::Deny
        );
    }

    #[test]
    fn test_verdict_exit_codes() {
        assert_eq!(Verdict::Allow.exit_code(), 0);
        assert_eq!(Verdict::Deny.exit_code(), 2);
        assert!(Verdict::Deny.is_denied());
        assert!(!Verdict::Allow.is_denied());
    }
}
