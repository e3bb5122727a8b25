//! Status matching and classification.
//!
//! A [`StatusMatcher`] holds acceptance rules. A rule is either an exact
//! three-digit code (`404`) or a single digit naming a whole status block
//! (`5` accepts `500..=599`).

/// A set of status acceptance rules.
///
/// # Examples
///
/// ```
/// use fetchwrap::StatusMatcher;
///
/// let retry = StatusMatcher::new([408, 425, 429, 5]);
/// assert!(retry.matches(503));
/// assert!(retry.matches(429));
/// assert!(!retry.matches(404));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMatcher {
    rules: Vec<u16>,
}

impl StatusMatcher {
    /// Creates a matcher from exact codes and block digits.
    pub fn new(rules: impl IntoIterator<Item = u16>) -> Self {
        Self {
            rules: rules.into_iter().collect(),
        }
    }

    /// The default success rules: any `2xx`.
    pub fn success() -> Self {
        Self::new([2])
    }

    /// The default retry rules: `408`, `425`, `429` and any `5xx`.
    pub fn retryable() -> Self {
        Self::new([408, 425, 429, 5])
    }

    /// Returns `true` if `code` equals a rule or its hundreds digit does.
    pub fn matches(&self, code: u16) -> bool {
        self.rules.contains(&code) || self.rules.contains(&(code / 100))
    }

    /// The raw rules, in the order they were given.
    pub fn rules(&self) -> &[u16] {
        &self.rules
    }
}

/// Outcome of classifying a single response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// The status matched the success rules.
    pub success: bool,
    /// The status matched the retry rules.
    pub retryable: bool,
}

/// Classifies `code` against both rule sets.
///
/// Both flags are always computed; the attempt loop only looks at
/// `retryable` when `success` is false.
pub fn classify(code: u16, success: &StatusMatcher, retry: &StatusMatcher) -> Classification {
    Classification {
        success: success.matches(code),
        retryable: retry.matches(code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_rules() {
        let matcher = StatusMatcher::new([5]);
        assert!(matcher.matches(500));
        assert!(matcher.matches(599));
        assert!(!matcher.matches(499));
        assert!(!matcher.matches(600));
    }

    #[test]
    fn test_exact_rules() {
        let matcher = StatusMatcher::new([404]);
        assert!(matcher.matches(404));
        assert!(!matcher.matches(400));
    }

    #[test]
    fn test_zero_block_accepts_opaque_status() {
        let matcher = StatusMatcher::new([0, 2]);
        assert!(matcher.matches(0));
        assert!(matcher.matches(204));
        assert!(!matcher.matches(301));
    }

    #[test]
    fn test_classify_defaults() {
        let success = StatusMatcher::success();
        let retry = StatusMatcher::retryable();

        assert_eq!(
            classify(200, &success, &retry),
            Classification {
                success: true,
                retryable: false
            }
        );
        assert_eq!(
            classify(503, &success, &retry),
            Classification {
                success: false,
                retryable: true
            }
        );
        assert_eq!(
            classify(404, &success, &retry),
            Classification {
                success: false,
                retryable: false
            }
        );
        assert!(classify(425, &success, &retry).retryable);
    }
}
