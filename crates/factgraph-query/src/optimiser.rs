use crate::types::{Filter, Group, Query, Term, TriplePatternAst, UnionBranch};

/// Predicates that narrow a scan more than their concrete-position count
/// alone suggests.
const SELECTIVE_PREDICATES: &[&str] = &["prov:wasGeneratedBy", "prov:used"];

/// Rewrite `query` into an equivalent, hopefully cheaper plan. Purely
/// advisory: the executor (`crate::executor`) must produce identical
/// results whether or not this function ran.
pub fn optimise(mut query: Query) -> Query {
    let (patterns, filters) = reorder_and_push_down(query.patterns, query.filters);
    query.patterns = patterns;
    query.filters = filters;

    query.optionals = query.optionals.into_iter().map(optimise_group).collect();
    query.unions = query
        .unions
        .into_iter()
        .map(|branch| UnionBranch {
            left: optimise_group(branch.left),
            right: optimise_group(branch.right),
        })
        .collect();

    query
}

fn optimise_group(mut group: Group) -> Group {
    let (patterns, filters) = reorder_and_push_down(group.patterns, group.filters);
    group.patterns = patterns;
    group.filters = filters;
    group.optionals = group.optionals.into_iter().map(optimise_group).collect();
    group
}

/// Sort patterns by selectivity, then attach each filter to the earliest
/// pattern that binds every variable it needs.
fn reorder_and_push_down(mut patterns: Vec<TriplePatternAst>, filters: Vec<Filter>) -> (Vec<TriplePatternAst>, Vec<Filter>) {
    let mut scored: Vec<(i32, TriplePatternAst)> = patterns.drain(..).map(|p| (selectivity_score(&p), p)).collect();
    scored.sort_by_key(|(score, _)| *score);
    let patterns: Vec<TriplePatternAst> = scored.into_iter().map(|(_, p)| p).collect();

    let mut root_filters = Vec::new();
    let mut pushed: Vec<Vec<Filter>> = vec![Vec::new(); patterns.len()];
    let mut bound: Vec<String> = Vec::new();

    'filter: for filter in filters {
        bound.clear();
        for (idx, pattern) in patterns.iter().enumerate() {
            collect_bound_variables(pattern, &mut bound);
            if bound.contains(&filter.variable) {
                pushed[idx].push(filter);
                continue 'filter;
            }
        }
        root_filters.push(filter);
    }

    let mut patterns_with_filters = Vec::with_capacity(patterns.len());
    for (pattern, mut attached) in patterns.into_iter().zip(pushed.into_iter()) {
        patterns_with_filters.push(pattern);
        root_filters.append(&mut attached);
    }

    (patterns_with_filters, root_filters)
}

/// Lower score = more selective. Each bound (non-variable) position scores
/// -1; a recognised high-selectivity PROV-O predicate scores an extra -1.
fn selectivity_score(pattern: &TriplePatternAst) -> i32 {
    let mut score = 0;
    for term in [&pattern.subject, &pattern.predicate, &pattern.object] {
        if !term.is_variable() {
            score -= 1;
        }
    }
    if let Term::Iri(iri) | Term::Literal(iri) = &pattern.predicate {
        if SELECTIVE_PREDICATES.contains(&iri.as_str()) {
            score -= 1;
        }
    }
    score
}

fn collect_bound_variables(pattern: &TriplePatternAst, out: &mut Vec<String>) {
    for term in [&pattern.subject, &pattern.predicate, &pattern.object] {
        if let Term::Variable(name) = term {
            if !out.contains(name) {
                out.push(name.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Term {
        Term::Variable(name.to_string())
    }
    fn iri(name: &str) -> Term {
        Term::Iri(name.to_string())
    }

    #[test]
    fn fully_variable_pattern_sorts_after_fully_bound_one() {
        let loose = TriplePatternAst { subject: var("s"), predicate: var("p"), object: var("o") };
        let tight = TriplePatternAst { subject: iri("Alice"), predicate: iri("knows"), object: iri("Bob") };
        let query = Query {
            patterns: vec![loose.clone(), tight.clone()],
            ..Default::default()
        };
        let optimised = optimise(query);
        assert_eq!(optimised.patterns[0], tight);
        assert_eq!(optimised.patterns[1], loose);
    }

    #[test]
    fn selective_prov_predicate_outranks_equally_bound_pattern() {
        let plain = TriplePatternAst { subject: var("a"), predicate: iri("knows"), object: var("b") };
        let prov = TriplePatternAst { subject: var("c"), predicate: iri("prov:wasGeneratedBy"), object: var("d") };
        let query = Query {
            patterns: vec![plain.clone(), prov.clone()],
            ..Default::default()
        };
        let optimised = optimise(query);
        assert_eq!(optimised.patterns[0], prov);
        assert_eq!(optimised.patterns[1], plain);
    }

    #[test]
    fn filter_pushes_down_to_earliest_binding_pattern() {
        let p1 = TriplePatternAst { subject: var("x"), predicate: iri("knows"), object: var("y") };
        let filter = Filter { variable: "x".to_string(), op: crate::types::FilterOp::Eq, value: "Alice".to_string() };
        let query = Query {
            patterns: vec![p1],
            filters: vec![filter.clone()],
            ..Default::default()
        };
        let optimised = optimise(query);
        // With a single pattern the filter has nowhere else to go; it still
        // ends up attached to the query's filter list.
        assert_eq!(optimised.filters, vec![filter]);
    }
}
