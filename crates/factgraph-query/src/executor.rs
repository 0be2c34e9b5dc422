use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::DateTime;
use factgraph_core::{FactGraphError, Node, TriplePattern};
use factgraph_storage::StorageCoordinator;
use regex::Regex;

use crate::aggregate::aggregate;
use crate::mapper::{enrich_binding, is_derived_key};
use crate::types::{Binding, Filter, FilterOp, Group, OrderKey, Query, SortDirection, Term, TriplePatternAst};

/// Run the full eight-stage pipeline and return the final,
/// projected rows. Any stage failure aborts with `QueryError` — no partial
/// results ever reach the caller.
pub fn execute(coordinator: &StorageCoordinator, query: &Query) -> Result<Vec<Binding>, FactGraphError> {
    let root = Group {
        patterns: query.patterns.clone(),
        filters: query.filters.clone(),
        optionals: query.optionals.clone(),
    };
    let mut rows = evaluate_group(coordinator, &root)?;

    for branch in &query.unions {
        rows.extend(evaluate_group(coordinator, &branch.left)?);
        rows.extend(evaluate_group(coordinator, &branch.right)?);
    }

    if query.has_aggregates {
        rows = aggregate(rows, &query.group_by, &query.aggregates);
    }

    sort_rows(&mut rows, &query.order_by);

    let offset = query.offset.unwrap_or(0);
    rows = rows.into_iter().skip(offset).collect();
    if let Some(limit) = query.limit {
        rows.truncate(limit);
    }

    Ok(rows.into_iter().map(|row| project(row, query)).collect())
}

/// BGP evaluation + filters + recursive OPTIONAL joins for one group.
/// UNION is handled one level up — branches are independent sub-BGPs, not
/// nested groups.
fn evaluate_group(coordinator: &StorageCoordinator, group: &Group) -> Result<Vec<Binding>, FactGraphError> {
    let mut rows = evaluate_bgp(coordinator, &group.patterns, vec![Binding::new()]);
    rows.retain(|row| group.filters.iter().all(|f| apply_filter(row, f)));

    for optional in &group.optionals {
        let optional_rows = evaluate_group(coordinator, optional)?;
        rows = left_outer_join(rows, optional_rows);
    }

    Ok(rows)
}

fn evaluate_bgp(coordinator: &StorageCoordinator, patterns: &[TriplePatternAst], start: Vec<Binding>) -> Vec<Binding> {
    let mut bindings = start;
    for pattern in patterns {
        let mut next = Vec::new();
        for binding in &bindings {
            let (subject_pat, subject_var) = resolve(&pattern.subject, binding);
            let (predicate_pat, predicate_var) = resolve(&pattern.predicate, binding);
            let (object_pat, object_var) = resolve(&pattern.object, binding);

            let triple_pattern = TriplePattern {
                subject: subject_pat,
                predicate: predicate_pat,
                object: object_pat,
            };

            for matched in coordinator.query(&triple_pattern) {
                if let Some(candidate) = merge_match(
                    binding,
                    &matched.node,
                    &subject_var,
                    &predicate_var,
                    &object_var,
                ) {
                    next.push(candidate);
                }
            }
        }
        bindings = next;
    }
    bindings
}

/// Resolve one triple-position term against the binding so far. Returns the
/// concrete value to constrain the scan by (if any) and, separately, the
/// variable name that should receive the result's value (only for
/// variables not already bound).
fn resolve(term: &Term, binding: &Binding) -> (Option<String>, Option<String>) {
    match term {
        Term::Variable(name) => match binding.get(name).cloned().flatten() {
            Some(value) => (Some(value), None),
            None => (None, Some(name.clone())),
        },
        Term::Literal(value) | Term::Iri(value) => (Some(value.clone()), None),
    }
}

/// Merge one matched node into `binding`, producing a new binding keyed by
/// the pattern's own variable names — dropping the row on conflict, e.g. a
/// repeated variable bound to two different values.
fn merge_match(
    binding: &Binding,
    node: &Node,
    subject_var: &Option<String>,
    predicate_var: &Option<String>,
    object_var: &Option<String>,
) -> Option<Binding> {
    let mut candidate = binding.clone();
    for (var, value) in [
        (subject_var, &node.subject),
        (predicate_var, &node.predicate),
        (object_var, &node.object),
    ] {
        if let Some(name) = var {
            match candidate.get(name).cloned().flatten() {
                Some(existing) if &existing != value => return None,
                _ => {
                    candidate.insert(name.clone(), Some(value.clone()));
                }
            }
        }
    }

    let raw: Binding = HashMap::from([
        ("s".to_string(), Some(node.subject.clone())),
        ("p".to_string(), Some(node.predicate.clone())),
        ("o".to_string(), Some(node.object.clone())),
        ("validator".to_string(), Some(node.validator.to_string())),
        ("timestamp".to_string(), Some(node.timestamp.to_string())),
    ]);
    for (key, value) in enrich_binding(raw) {
        candidate.entry(key).or_insert(value);
    }

    Some(candidate)
}

/// Left-outer-join `left` with `right` on whatever SPARQL variables they
/// share; unmatched left rows keep their own bindings with the optional's
/// exclusive variables left unbound (`nil`). Join compatibility is computed
/// only over the query's own variable names — the raw positional keys and
/// mapper aliases that every binding carries are excluded, since two
/// unrelated rows sharing e.g. `"s"` or `"validator"` is not a real join
/// condition.
fn left_outer_join(left: Vec<Binding>, right: Vec<Binding>) -> Vec<Binding> {
    let mut out = Vec::new();
    for l in &left {
        let shared_keys: Vec<&String> = l.keys().filter(|k| !is_derived_key(k)).collect();
        let mut joined_any = false;
        for r in &right {
            let compatible = shared_keys.iter().all(|key| match (l.get(*key), r.get(*key)) {
                (Some(lv), Some(rv)) => lv == rv,
                _ => true,
            });
            if compatible {
                let mut merged = l.clone();
                for (k, v) in r {
                    merged.entry(k.clone()).or_insert_with(|| v.clone());
                }
                out.push(merged);
                joined_any = true;
            }
        }
        if !joined_any {
            out.push(l.clone());
        }
    }
    out
}

fn apply_filter(row: &Binding, filter: &Filter) -> bool {
    let value = row.get(&filter.variable).cloned().flatten();

    match filter.op {
        FilterOp::Regex => match (&value, Regex::new(&filter.value)) {
            (Some(v), Ok(re)) => re.is_match(v),
            _ => false,
        },
        FilterOp::Eq => value.as_deref() == Some(filter.value.as_str()),
        FilterOp::Ne => value.as_deref() != Some(filter.value.as_str()),
        FilterOp::Lt | FilterOp::Gt | FilterOp::Le | FilterOp::Ge => {
            let lhs = value.as_deref().and_then(|v| v.parse::<f64>().ok());
            let rhs = filter.value.parse::<f64>().ok();
            match (lhs, rhs) {
                (Some(a), Some(b)) => match filter.op {
                    FilterOp::Lt => a < b,
                    FilterOp::Gt => a > b,
                    FilterOp::Le => a <= b,
                    FilterOp::Ge => a >= b,
                    _ => unreachable!(),
                },
                _ => false,
            }
        }
    }
}

fn sort_rows(rows: &mut [Binding], order_by: &[OrderKey]) {
    rows.sort_by(|a, b| {
        for key in order_by {
            let ordering = compare_values(a.get(&key.variable).and_then(Option::as_ref), b.get(&key.variable).and_then(Option::as_ref));
            let ordering = match key.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

/// Cross-type ordering shared by ORDER BY and MIN/MAX:
/// `nil` first, then numeric, then chronological, then lexical, with a
/// stringified fallback for genuinely mixed types.
pub(crate) fn compare_values(a: Option<&String>, b: Option<&String>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => {
            if let (Ok(na), Ok(nb)) = (a.parse::<f64>(), b.parse::<f64>()) {
                return na.partial_cmp(&nb).unwrap_or(Ordering::Equal);
            }
            if let (Ok(da), Ok(db)) = (DateTime::parse_from_rfc3339(a), DateTime::parse_from_rfc3339(b)) {
                return da.cmp(&db);
            }
            a.cmp(b)
        }
    }
}

/// Final projection: pick each output variable's binding, falling back to
/// its source triple position, else `nil`.
fn project(row: Binding, query: &Query) -> Binding {
    let mut projected = Binding::new();
    for name in &query.variables {
        let value = row.get(name).cloned().flatten().or_else(|| {
            query
                .variable_positions
                .get(name)
                .and_then(|pos| row.get(pos).cloned().flatten())
        });
        projected.insert(name.clone(), value);
    }
    projected
}
