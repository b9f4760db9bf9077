use convert_yaml::budget::{Budget, BudgetBreach, check_yaml_budget};
use convert_yaml::options::AliasLimits;
use convert_yaml::{Error, to_value, to_value_with_options};

fn billion_laughs_yaml(levels: usize, fan_out: usize) -> String {
    assert!(levels > 0, "need at least one level");
    assert!(fan_out > 0, "fan_out must be positive");

    let mut yaml = String::new();
    yaml.push_str("l0: &L0 [\"LOL\", \"LOL\"]\n");
    for level in 1..=levels {
        yaml.push_str(&format!("l{level}: &L{level} ["));
        for idx in 0..fan_out {
            if idx > 0 {
                yaml.push_str(", ");
            }
            yaml.push_str(&format!("*L{}", level - 1));
        }
        yaml.push_str("]\n");
    }
    yaml.push_str(&format!("root: *L{levels}\n"));
    yaml
}

#[test]
fn wide_alias_fan_out_trips_the_ratio_check() {
    let yaml = billion_laughs_yaml(1, 128);
    let report = check_yaml_budget(&yaml, &Budget::default()).unwrap();
    assert!(
        matches!(
            report.breached,
            Some(BudgetBreach::AliasAnchorRatio { aliases, anchors })
                if aliases > anchors
        ),
        "expected alias/anchor ratio breach, got {:?}",
        report.breached
    );

    let err = to_value(&yaml).unwrap_err();
    assert!(
        matches!(
            err.without_snippet(),
            Error::Budget {
                breach: BudgetBreach::AliasAnchorRatio { .. },
                ..
            }
        ),
        "{err:?}"
    );
}

#[test]
fn deep_billion_laughs_is_stopped_by_alias_limits() {
    // Nine anchors with ten aliases each pass the ratio check but expand to 10^9 nodes.
    let yaml = billion_laughs_yaml(9, 10);
    let options = convert_yaml::options! {
        alias_limits: AliasLimits {
            max_expanded_nodes: 100_000,
            ..AliasLimits::default()
        },
    };
    let err = to_value_with_options(&yaml, &options).unwrap_err();
    assert!(
        matches!(err.without_snippet(), Error::AliasLimit { .. }),
        "{err:?}"
    );
}

#[test]
fn default_limits_stop_billion_laughs() {
    let err = to_value(&billion_laughs_yaml(9, 10)).unwrap_err();
    assert!(
        matches!(
            err.without_snippet(),
            Error::AliasLimit { .. } | Error::Budget { .. }
        ),
        "{err:?}"
    );
}

#[test]
fn deep_nesting_is_rejected() {
    let depth = Budget::default().max_depth + 1;
    let yaml = format!("{}{}", "[".repeat(depth), "]".repeat(depth));
    let err = to_value(&yaml).unwrap_err();
    assert!(
        matches!(
            err.without_snippet(),
            Error::Budget {
                breach: BudgetBreach::Depth { .. },
                ..
            }
        ),
        "{err:?}"
    );
}

#[test]
fn parser_recursion_limit_applies_without_a_budget() {
    let options = convert_yaml::options! { budget: None };
    let depth = 1_000;
    let yaml = format!("{}{}", "[".repeat(depth), "]".repeat(depth));
    let err = to_value_with_options(&yaml, &options).unwrap_err();
    assert!(
        matches!(err.without_snippet(), Error::Parse { .. }),
        "{err:?}"
    );
}

#[test]
fn nested_anchors_around_a_large_scalar() {
    let depth = 100;
    let mut yaml = String::new();
    for level in 0..depth {
        yaml.push_str(&" ".repeat(level * 2));
        yaml.push_str(&format!("- &a{level}\n"));
    }
    yaml.push_str(&" ".repeat(depth * 2));
    yaml.push_str(&format!("- {}\n", "x".repeat(1024 * 1024)));

    let mut value = to_value(&yaml).unwrap();
    for _ in 0..depth {
        value = value[0].take();
    }
    assert_eq!(value[0].as_str().map(str::len), Some(1024 * 1024));
}

#[test]
fn oversized_scalars_are_rejected() {
    let options = convert_yaml::options! {
        budget: Some(convert_yaml::budget! { max_total_scalar_bytes: 1024 }),
    };
    let yaml = format!("a: {}\n", "x".repeat(2048));
    let err = to_value_with_options(&yaml, &options).unwrap_err();
    assert!(
        matches!(
            err.without_snippet(),
            Error::Budget {
                breach: BudgetBreach::ScalarBytes { .. },
                ..
            }
        ),
        "{err:?}"
    );
}
