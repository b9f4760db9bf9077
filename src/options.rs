use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::budget::{Budget, BudgetReport};

/// What to do when a mapping repeats a key (compared after key coercion).
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplicateKeyPolicy {
    /// Fail with [`crate::Error::DuplicateKey`].
    Error,
    /// Keep the first value, ignore later ones.
    FirstWins,
    /// Keep the last value. The key stays at the position of its first occurrence.
    LastWins,
}

/// Handling of YAML streams with more than one document.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentPolicy {
    /// Convert the first document; later documents are neither parsed nor converted.
    FirstOnly,
    /// Fail with [`crate::Error::MultipleDocuments`] when a second document starts.
    Single,
}

/// Range of integers emitted as JSON numbers.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegerRange {
    /// Anything representable as `i64` or `u64`.
    Full64,
    /// `-(2^53 - 1) ..= 2^53 - 1`, exact in IEEE doubles (JavaScript consumers).
    JsSafe,
}

impl IntegerRange {
    pub(crate) fn contains(self, v: i128) -> bool {
        const JS_MAX: i128 = (1 << 53) - 1;
        match self {
            IntegerRange::Full64 => v >= i64::MIN as i128 && v <= u64::MAX as i128,
            IntegerRange::JsSafe => (-JS_MAX..=JS_MAX).contains(&v),
        }
    }
}

/// What happens to integers outside the [`IntegerRange`].
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LargeIntegerPolicy {
    /// Emit the integer as a decimal JSON string.
    String,
    /// Fail with [`crate::Error::PrecisionLoss`].
    Reject,
}

/// Handling of tags outside the YAML core type set.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnknownTagPolicy {
    /// Fail with [`crate::Error::UnsupportedTag`].
    Reject,
    /// Convert the node as if it carried no tag.
    Ignore,
}

/// Bounds on alias expansion. Aliases are deep-copied into the output, so a
/// small document can describe an exponentially large one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasLimits {
    /// Maximum number of nodes produced by alias expansion across the document.
    pub max_expanded_nodes: usize,
    /// Maximum nesting of aliases inside expanded aliases.
    pub max_alias_depth: usize,
    /// Maximum number of times a single anchor may be expanded.
    /// Use `usize::MAX` for "unlimited".
    pub max_expansions_per_anchor: usize,
}

impl Default for AliasLimits {
    fn default() -> Self {
        Self {
            max_expanded_nodes: 1_000_000,
            max_alias_depth: 64,
            max_expansions_per_anchor: usize::MAX,
        }
    }
}

pub type BudgetReportCallback = Rc<RefCell<dyn FnMut(BudgetReport) + 'static>>;

/// Decoder and transform configuration.
///
/// ```rust
/// use convert_yaml::options::DuplicateKeyPolicy;
///
/// let options = convert_yaml::options! {
///     duplicate_keys: DuplicateKeyPolicy::Error,
///     strict_booleans: true,
/// };
/// let err = convert_yaml::to_value_with_options("a: 1\na: 2\n", &options).unwrap_err();
/// assert!(err.to_string().contains("duplicate key"));
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Budget applied to the raw event stream. `None` disables it.
    pub budget: Option<Budget>,
    /// Receives the final budget report, on success and on breach.
    #[serde(skip)]
    pub budget_report: Option<BudgetReportCallback>,
    pub alias_limits: AliasLimits,
    pub duplicate_keys: DuplicateKeyPolicy,
    pub documents: DocumentPolicy,
    /// Only `true`/`false` (and their capitalized forms) are booleans;
    /// `yes`/`no`/`on`/`off` stay strings.
    pub strict_booleans: bool,
    /// YAML 1.1 octal: `012` is 10. When off, `012` is decimal 12.
    pub legacy_octal_numbers: bool,
    pub integer_range: IntegerRange,
    pub large_integers: LargeIntegerPolicy,
    pub unknown_tags: UnknownTagPolicy,
    /// Honour `<<` merge keys. When off, `<<` is an ordinary key.
    pub merge_keys: bool,
    /// Wrap located errors with a rendered source snippet.
    pub with_snippet: bool,
    /// Horizontal crop radius (in characters) for snippets. `0` disables snippets.
    pub crop_radius: usize,
}

impl Options {
    /// Registers a budget-report callback.
    ///
    /// ```rust
    /// use std::cell::Cell;
    /// use std::rc::Rc;
    ///
    /// let seen = Rc::new(Cell::new(0));
    /// let sink = seen.clone();
    /// let options = convert_yaml::Options::default()
    ///     .with_budget_report(move |report| sink.set(report.nodes));
    /// convert_yaml::to_value_with_options("a: [1, 2]\n", &options).unwrap();
    /// assert_eq!(seen.get(), 5);
    /// ```
    pub fn with_budget_report<F>(mut self, cb: F) -> Self
    where
        F: FnMut(BudgetReport) + 'static,
    {
        self.budget_report = Some(Rc::new(RefCell::new(cb)));
        self
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            budget: Some(Budget::default()),
            budget_report: None,
            alias_limits: AliasLimits::default(),
            duplicate_keys: DuplicateKeyPolicy::LastWins,
            documents: DocumentPolicy::FirstOnly,
            strict_booleans: false,
            legacy_octal_numbers: true,
            integer_range: IntegerRange::Full64,
            large_integers: LargeIntegerPolicy::String,
            unknown_tags: UnknownTagPolicy::Reject,
            merge_keys: true,
            with_snippet: true,
            crop_radius: 64,
        }
    }
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("budget", &self.budget)
            .field(
                "budget_report",
                &if self.budget_report.is_some() { "set" } else { "none" },
            )
            .field("alias_limits", &self.alias_limits)
            .field("duplicate_keys", &self.duplicate_keys)
            .field("documents", &self.documents)
            .field("strict_booleans", &self.strict_booleans)
            .field("legacy_octal_numbers", &self.legacy_octal_numbers)
            .field("integer_range", &self.integer_range)
            .field("large_integers", &self.large_integers)
            .field("unknown_tags", &self.unknown_tags)
            .field("merge_keys", &self.merge_keys)
            .field("with_snippet", &self.with_snippet)
            .field("crop_radius", &self.crop_radius)
            .finish()
    }
}

/// Encoder configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonOptions {
    /// Spaces per indentation level. `None` renders everything on one line.
    pub indent: Option<usize>,
    /// Escape every non-ASCII character as `\uXXXX`.
    pub ascii_only: bool,
}

impl Default for JsonOptions {
    fn default() -> Self {
        Self {
            indent: Some(2),
            ascii_only: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_policies() {
        let opts = Options::default();
        assert!(opts.budget.is_some());
        assert!(opts.budget_report.is_none());
        assert_eq!(opts.duplicate_keys, DuplicateKeyPolicy::LastWins);
        assert_eq!(opts.documents, DocumentPolicy::FirstOnly);
        assert_eq!(opts.integer_range, IntegerRange::Full64);
        assert_eq!(opts.large_integers, LargeIntegerPolicy::String);
        assert_eq!(opts.unknown_tags, UnknownTagPolicy::Reject);
        assert!(opts.legacy_octal_numbers);
        assert!(!opts.strict_booleans);
        assert!(opts.merge_keys);
        assert!(opts.with_snippet);
        assert_eq!(opts.crop_radius, 64);
        assert_eq!(JsonOptions::default().indent, Some(2));
    }

    #[test]
    fn debug_hides_callback() {
        let opts = Options::default();
        assert!(format!("{opts:?}").contains("budget_report: \"none\""));
        let opts = opts.with_budget_report(|_| {});
        assert!(format!("{opts:?}").contains("budget_report: \"set\""));
    }

    #[test]
    fn integer_ranges() {
        assert!(IntegerRange::Full64.contains(u64::MAX as i128));
        assert!(IntegerRange::Full64.contains(i64::MIN as i128));
        assert!(!IntegerRange::Full64.contains(u64::MAX as i128 + 1));
        assert!(IntegerRange::JsSafe.contains(9_007_199_254_740_991));
        assert!(!IntegerRange::JsSafe.contains(9_007_199_254_740_992));
    }

    #[test]
    fn alias_limit_defaults() {
        let limits = AliasLimits::default();
        assert_eq!(limits.max_expanded_nodes, 1_000_000);
        assert_eq!(limits.max_alias_depth, 64);
        assert_eq!(limits.max_expansions_per_anchor, usize::MAX);
    }
}
