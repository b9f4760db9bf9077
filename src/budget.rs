//! Resource budget for the raw YAML event stream.
//!
//! Configuration files are often untrusted input. The decoder feeds every parser
//! event to a [`BudgetEnforcer`] and stops as soon as a limit is exceeded, before
//! a pathological input can allocate a huge tree. Alias expansion during the
//! transform is bounded separately by [`crate::options::AliasLimits`].

use std::borrow::Cow;
use std::collections::HashSet;

use saphyr_parser::{Event, Parser, ScanError};
use serde::{Deserialize, Serialize};

/// Limits enforced while decoding.
///
/// The defaults are generous for App Engine configuration files while still
/// stopping obvious resource-amplifying inputs.
///
/// ```rust
/// let options = convert_yaml::options! {
///     budget: Some(convert_yaml::budget! { max_depth: 32 }),
/// };
/// let json = convert_yaml::convert_str_with_options(
///     "runtime: python39\n",
///     &options,
///     &convert_yaml::JsonOptions::default(),
/// ).unwrap();
/// assert!(json.contains("python39"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    /// Maximum total parser events. Default: 1,000,000
    pub max_events: usize,
    /// Maximum alias (`*ref`) events. Default: 50,000
    pub max_aliases: usize,
    /// Maximum distinct anchor definitions. Default: 50,000
    pub max_anchors: usize,
    /// Maximum nesting depth of sequences and mappings. Default: 128
    ///
    /// The parser refuses nesting beyond about 256 levels on its own, reported
    /// as [`crate::Error::Parse`]. Values above that never trigger.
    pub max_depth: usize,
    /// Maximum nodes (scalars, sequence starts, mapping starts). Default: 250,000
    pub max_nodes: usize,
    /// Maximum sum of scalar lengths in bytes. Default: 64 MiB
    pub max_total_scalar_bytes: usize,
    /// Maximum number of merge keys (`<<`). Default: 10,000
    pub max_merge_keys: usize,
    /// Flag inputs that use many aliases relative to the anchors they define.
    /// Default: true
    pub enforce_alias_anchor_ratio: bool,
    /// Aliases needed before the ratio check applies. Default: 100
    pub alias_anchor_min_aliases: usize,
    /// Breach when `aliases > multiplier * anchors`. Default: 10
    pub alias_anchor_ratio_multiplier: usize,
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            max_events: 1_000_000,
            max_aliases: 50_000,
            max_anchors: 50_000,
            max_depth: 128,
            max_nodes: 250_000,
            max_total_scalar_bytes: 64 * 1024 * 1024,
            max_merge_keys: 10_000,
            enforce_alias_anchor_ratio: true,
            alias_anchor_min_aliases: 100,
            alias_anchor_ratio_multiplier: 10,
        }
    }
}

/// Which limit was exceeded, with the counter value at the moment of the breach.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BudgetBreach {
    Events { events: usize },
    Aliases { aliases: usize },
    Anchors { anchors: usize },
    Depth { depth: usize },
    Nodes { nodes: usize },
    ScalarBytes { total_scalar_bytes: usize },
    MergeKeys { merge_keys: usize },
    AliasAnchorRatio { aliases: usize, anchors: usize },
    /// A container end without a matching start.
    Unbalanced,
}

impl std::fmt::Display for BudgetBreach {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BudgetBreach::Events { events } => write!(f, "too many parser events ({events})"),
            BudgetBreach::Aliases { aliases } => write!(f, "too many aliases ({aliases})"),
            BudgetBreach::Anchors { anchors } => write!(f, "too many anchors ({anchors})"),
            BudgetBreach::Depth { depth } => write!(f, "nesting too deep ({depth})"),
            BudgetBreach::Nodes { nodes } => write!(f, "too many nodes ({nodes})"),
            BudgetBreach::ScalarBytes { total_scalar_bytes } => {
                write!(f, "scalar content too large ({total_scalar_bytes} bytes)")
            }
            BudgetBreach::MergeKeys { merge_keys } => {
                write!(f, "too many merge keys ({merge_keys})")
            }
            BudgetBreach::AliasAnchorRatio { aliases, anchors } => write!(
                f,
                "excessive alias use ({aliases} aliases for {anchors} anchors)"
            ),
            BudgetBreach::Unbalanced => f.write_str("unbalanced container events"),
        }
    }
}

/// Counters gathered while scanning, reported whether or not a limit was hit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetReport {
    /// `Some(..)` if a limit was exceeded.
    pub breached: Option<BudgetBreach>,
    pub events: usize,
    pub aliases: usize,
    pub anchors: usize,
    pub nodes: usize,
    pub max_depth: usize,
    pub total_scalar_bytes: usize,
    pub merge_keys: usize,
}

/// Stateful meter applying a [`Budget`] to a stream of parser [`Event`]s.
#[derive(Debug)]
pub struct BudgetEnforcer {
    budget: Budget,
    report: BudgetReport,
    depth: usize,
    defined_anchors: HashSet<usize>,
}

impl BudgetEnforcer {
    pub fn new(budget: Budget) -> Self {
        Self {
            budget,
            report: BudgetReport::default(),
            depth: 0,
            defined_anchors: HashSet::new(),
        }
    }

    /// Count one parser event. Returns the breach as soon as a limit is exceeded.
    pub fn observe(&mut self, ev: &Event) -> Result<(), BudgetBreach> {
        self.report.events += 1;
        if self.report.events > self.budget.max_events {
            return Err(BudgetBreach::Events {
                events: self.report.events,
            });
        }

        match ev {
            Event::Alias(_) => {
                self.report.aliases += 1;
                if self.report.aliases > self.budget.max_aliases {
                    return Err(BudgetBreach::Aliases {
                        aliases: self.report.aliases,
                    });
                }
            }
            Event::Scalar(value, _, anchor_id, _) => {
                self.bump_nodes()?;
                let len = match value {
                    Cow::Borrowed(s) => s.len(),
                    Cow::Owned(s) => s.len(),
                };
                self.report.total_scalar_bytes = self.report.total_scalar_bytes.saturating_add(len);
                if self.report.total_scalar_bytes > self.budget.max_total_scalar_bytes {
                    return Err(BudgetBreach::ScalarBytes {
                        total_scalar_bytes: self.report.total_scalar_bytes,
                    });
                }
                self.record_anchor(*anchor_id)?;
            }
            Event::SequenceStart(anchor_id, _) | Event::MappingStart(anchor_id, _) => {
                self.bump_nodes()?;
                self.depth += 1;
                self.report.max_depth = self.report.max_depth.max(self.depth);
                if self.depth > self.budget.max_depth {
                    return Err(BudgetBreach::Depth { depth: self.depth });
                }
                self.record_anchor(*anchor_id)?;
            }
            Event::SequenceEnd | Event::MappingEnd => {
                self.depth = self.depth.checked_sub(1).ok_or(BudgetBreach::Unbalanced)?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Count a `<<` merge key. The decoder calls this because only it knows
    /// whether a scalar sits in key position.
    pub fn observe_merge_key(&mut self) -> Result<(), BudgetBreach> {
        self.report.merge_keys += 1;
        if self.report.merge_keys > self.budget.max_merge_keys {
            return Err(BudgetBreach::MergeKeys {
                merge_keys: self.report.merge_keys,
            });
        }
        Ok(())
    }

    fn bump_nodes(&mut self) -> Result<(), BudgetBreach> {
        self.report.nodes += 1;
        if self.report.nodes > self.budget.max_nodes {
            return Err(BudgetBreach::Nodes {
                nodes: self.report.nodes,
            });
        }
        Ok(())
    }

    fn record_anchor(&mut self, anchor_id: usize) -> Result<(), BudgetBreach> {
        if anchor_id != 0 && self.defined_anchors.insert(anchor_id) {
            self.report.anchors = self.defined_anchors.len();
            if self.report.anchors > self.budget.max_anchors {
                return Err(BudgetBreach::Anchors {
                    anchors: self.report.anchors,
                });
            }
        }
        Ok(())
    }

    /// Report for a scan that stopped on `breach`.
    pub fn into_report(mut self, breach: BudgetBreach) -> BudgetReport {
        self.report.breached = Some(breach);
        self.report
    }

    /// Finish the scan, applying the alias/anchor ratio heuristic.
    pub fn finalize(mut self) -> BudgetReport {
        let r = &mut self.report;
        if self.budget.enforce_alias_anchor_ratio
            && r.aliases >= self.budget.alias_anchor_min_aliases
            && (r.anchors == 0
                || r.aliases > self.budget.alias_anchor_ratio_multiplier.saturating_mul(r.anchors))
        {
            r.breached = Some(BudgetBreach::AliasAnchorRatio {
                aliases: r.aliases,
                anchors: r.anchors,
            });
        }
        self.report
    }
}

/// Scan `input` against `budget` without building a document tree.
///
/// All documents of the stream are scanned. Merge keys are not counted here,
/// as that needs key-position tracking that only the decoder performs.
///
/// Returns `Err(ScanError)` if the YAML itself is malformed. A report with
/// `breached.is_some()` means the input should be rejected.
pub fn check_yaml_budget(input: &str, budget: &Budget) -> Result<BudgetReport, ScanError> {
    let mut parser = Parser::new_from_str(input);
    let mut enforcer = BudgetEnforcer::new(budget.clone());

    while let Some(item) = parser.next() {
        let (ev, _span) = item?;
        if let Err(breach) = enforcer.observe(&ev) {
            return Ok(enforcer.into_report(breach));
        }
    }
    Ok(enforcer.finalize())
}
