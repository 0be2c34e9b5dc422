use std::collections::HashSet;

use crate::types::{AggFn, AggregateSpec, Binding};
use crate::executor::compare_values;

/// Partition `rows` by `group_by` keys (a single group if empty) and compute
/// every aggregate spec over each partition.
pub fn aggregate(rows: Vec<Binding>, group_by: &[String], specs: &[AggregateSpec]) -> Vec<Binding> {
    let mut groups: Vec<(Vec<Option<String>>, Vec<Binding>)> = Vec::new();
    for row in rows {
        let key: Vec<Option<String>> = group_by.iter().map(|var| row.get(var).cloned().flatten()).collect();
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(row),
            None => groups.push((key, vec![row])),
        }
    }
    if groups.is_empty() && group_by.is_empty() {
        groups.push((Vec::new(), Vec::new()));
    }

    groups
        .into_iter()
        .map(|(key, members)| {
            let mut out: Binding = group_by.iter().cloned().zip(key).collect();
            for spec in specs {
                let value = compute_aggregate(spec, &members);
                out.insert(spec.alias.clone(), value.clone());
                out.insert(format!("count_{}", spec.variable), value);
            }
            out
        })
        .collect()
}

fn compute_aggregate(spec: &AggregateSpec, rows: &[Binding]) -> Option<String> {
    let raw_values: Vec<String> = rows
        .iter()
        .filter_map(|row| row.get(&spec.variable).cloned().flatten())
        .collect();

    let values = if spec.distinct {
        let mut seen = HashSet::new();
        raw_values.into_iter().filter(|v| seen.insert(v.clone())).collect()
    } else {
        raw_values
    };

    match spec.func {
        AggFn::Count => Some(values.len().to_string()),
        AggFn::Sum => {
            let sum: f64 = values.iter().filter_map(|v| v.parse::<f64>().ok()).sum();
            Some(format_number(sum))
        }
        AggFn::Avg => {
            let numeric: Vec<f64> = values.iter().filter_map(|v| v.parse::<f64>().ok()).collect();
            if numeric.is_empty() {
                None
            } else {
                Some(format_number(numeric.iter().sum::<f64>() / numeric.len() as f64))
            }
        }
        AggFn::Min => values.into_iter().min_by(|a, b| compare_values(Some(a), Some(b))),
        AggFn::Max => values.into_iter().max_by(|a, b| compare_values(Some(a), Some(b))),
        AggFn::GroupConcat => {
            let separator = spec.separator.as_deref().unwrap_or(",");
            Some(values.join(separator))
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn row(var: &str, value: &str) -> Binding {
        HashMap::from([(var.to_string(), Some(value.to_string()))])
    }

    fn spec(func: AggFn, variable: &str, distinct: bool) -> AggregateSpec {
        AggregateSpec {
            func,
            variable: variable.to_string(),
            distinct,
            alias: format!("{}_{}", func.name_lower(), variable),
            separator: None,
        }
    }

    #[test]
    fn count_ignores_null_bindings() {
        let rows = vec![row("x", "1"), HashMap::from([("x".to_string(), None)]), row("x", "2")];
        let out = aggregate(rows, &[], &[spec(AggFn::Count, "x", false)]);
        assert_eq!(out[0].get("count_x").cloned().flatten(), Some("2".to_string()));
    }

    #[test]
    fn count_distinct_deduplicates() {
        let rows = vec![row("x", "1"), row("x", "1"), row("x", "2")];
        let out = aggregate(rows, &[], &[spec(AggFn::Count, "x", true)]);
        assert_eq!(out[0].get("count_distinct_x").cloned().flatten(), Some("2".to_string()));
    }

    #[test]
    fn avg_of_empty_set_is_nil() {
        let out = aggregate(vec![], &[], &[spec(AggFn::Avg, "x", false)]);
        assert_eq!(out[0].get("avg_x").cloned().flatten(), None);
    }

    #[test]
    fn sum_skips_non_numeric_values() {
        let rows = vec![row("x", "10"), row("x", "not-a-number"), row("x", "5")];
        let out = aggregate(rows, &[], &[spec(AggFn::Sum, "x", false)]);
        assert_eq!(out[0].get("sum_x").cloned().flatten(), Some("15".to_string()));
    }

    #[test]
    fn group_concat_uses_custom_separator() {
        let rows = vec![row("x", "a"), row("x", "b")];
        let mut s = spec(AggFn::GroupConcat, "x", false);
        s.separator = Some(" | ".to_string());
        let out = aggregate(rows, &[], &[s]);
        assert_eq!(out[0].get("group_concat_x").cloned().flatten(), Some("a | b".to_string()));
    }

    #[test]
    fn groups_partition_by_group_by_key() {
        let rows = vec![
            HashMap::from([("g".to_string(), Some("A".to_string())), ("x".to_string(), Some("1".to_string()))]),
            HashMap::from([("g".to_string(), Some("B".to_string())), ("x".to_string(), Some("2".to_string()))]),
            HashMap::from([("g".to_string(), Some("A".to_string())), ("x".to_string(), Some("3".to_string()))]),
        ];
        let out = aggregate(rows, &["g".to_string()], &[spec(AggFn::Sum, "x", false)]);
        assert_eq!(out.len(), 2);
        let group_a = out.iter().find(|r| r.get("g").cloned().flatten() == Some("A".to_string())).unwrap();
        assert_eq!(group_a.get("sum_x").cloned().flatten(), Some("4".to_string()));
    }
}
