//! Result ranking and reduction.
//!
//! Every finished job yields a [`MetadataResult`]; [`select`] turns that raw
//! list into at most `query.amount()` results using the query's
//! [`Strategy`]:
//!
//! - **flat** groups results by provider, ranks each group by similarity to
//!   the query, then takes one item from each group in turn so the list is
//!   spread across providers.
//! - **deep** trusts provider priority and only uses similarity to break
//!   ties within a provider.

use std::cmp::Ordering;

use hugin_common::{Query, Strategy};

use crate::metadata::similarity::ratio;
use crate::metadata::{MetadataResult, Record};

/// How well `record` answers `query`, in `[0.0, 1.0]`.
///
/// An exact IMDb id match ranks 1.0. Otherwise the record's title (or name)
/// is compared against the query's title (or name); a missing text on
/// either side ranks 0.0.
pub fn rank(query: &Query, record: &Record) -> f64 {
    if let (Some(wanted), Some(got)) = (query.imdb_id(), record.imdb_id.as_deref()) {
        if wanted.eq_ignore_ascii_case(got) {
            return 1.0;
        }
    }

    match (query.reference_text(), record.display_text()) {
        (Some(wanted), Some(got)) => ratio(wanted, got),
        _ => 0.0,
    }
}

/// Reduce raw results to the final list for `query`.
///
/// Results without a record are dropped first.
pub fn select(results: Vec<MetadataResult>, query: &Query) -> Vec<MetadataResult> {
    let scored: Vec<(f64, MetadataResult)> = results
        .into_iter()
        .filter_map(|result| {
            let score = rank(query, result.record.as_ref()?);
            Some((score, result))
        })
        .collect();

    match query.strategy() {
        Strategy::Flat => select_flat(scored, query.amount()),
        Strategy::Deep => select_deep(scored, query.amount()),
    }
}

fn by_score_desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

struct Group {
    provider: String,
    priority: i32,
    items: Vec<(f64, MetadataResult)>,
}

fn select_flat(scored: Vec<(f64, MetadataResult)>, amount: usize) -> Vec<MetadataResult> {
    // Groups keep the order in which providers first appear.
    let mut groups: Vec<Group> = Vec::new();
    for (score, result) in scored {
        match groups.iter_mut().find(|g| g.provider == result.provider) {
            Some(group) => group.items.push((score, result)),
            None => groups.push(Group {
                provider: result.provider.clone(),
                priority: result.priority,
                items: vec![(score, result)],
            }),
        }
    }

    for group in &mut groups {
        group.items.sort_by(|a, b| by_score_desc(a.0, b.0));
    }
    groups.sort_by(|a, b| b.priority.cmp(&a.priority));

    let mut lanes: Vec<_> = groups.into_iter().map(|g| g.items.into_iter()).collect();
    let mut selected = Vec::with_capacity(amount);

    while selected.len() < amount {
        let mut progressed = false;
        for lane in &mut lanes {
            if selected.len() == amount {
                break;
            }
            if let Some((_, result)) = lane.next() {
                selected.push(result);
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }

    selected
}

fn select_deep(mut scored: Vec<(f64, MetadataResult)>, amount: usize) -> Vec<MetadataResult> {
    scored.sort_by(|a, b| {
        b.1.priority
            .cmp(&a.1.priority)
            .then_with(|| by_score_desc(a.0, b.0))
    });
    scored.into_iter().take(amount).map(|(_, r)| r).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use hugin_common::SubjectType;

    fn query(strategy: Strategy, amount: usize) -> Arc<Query> {
        Arc::new(
            Query::builder(SubjectType::Movie)
                .title("Sin City")
                .strategy(strategy)
                .amount(amount)
                .build()
                .unwrap(),
        )
    }

    fn result(query: &Arc<Query>, provider: &str, priority: i32, title: &str) -> MetadataResult {
        MetadataResult {
            provider: provider.to_string(),
            priority,
            query: Arc::clone(query),
            record: Some(Record::titled(title)),
            retries: 0,
        }
    }

    fn titles(results: &[MetadataResult]) -> Vec<&str> {
        results
            .iter()
            .map(|r| r.record.as_ref().and_then(|rec| rec.title.as_deref()).unwrap_or(""))
            .collect()
    }

    #[test]
    fn flat_round_robins_across_providers() {
        let q = query(Strategy::Flat, 3);
        let results = vec![
            result(&q, "a", 50, "Sin City"),
            result(&q, "a", 50, "Sin City 2"),
            result(&q, "a", 50, "Sin City 3 Extended"),
            result(&q, "b", 50, "Sin Cty"),
        ];

        let selected = select(results, &q);
        assert_eq!(titles(&selected), ["Sin City", "Sin Cty", "Sin City 2"]);
        assert_eq!(selected[1].provider, "b");
    }

    #[test]
    fn flat_ranks_within_each_group() {
        let q = query(Strategy::Flat, 2);
        let results = vec![
            result(&q, "a", 50, "Casablanca"),
            result(&q, "a", 50, "Sin City"),
        ];

        assert_eq!(titles(&select(results, &q)), ["Sin City", "Casablanca"]);
    }

    #[test]
    fn flat_orders_groups_by_priority() {
        let q = query(Strategy::Flat, 2);
        let results = vec![
            result(&q, "low", 10, "Sin City"),
            result(&q, "high", 90, "Sin City"),
        ];

        let selected = select(results, &q);
        assert_eq!(selected[0].provider, "high");
        assert_eq!(selected[1].provider, "low");
    }

    #[test]
    fn deep_follows_priority_then_similarity() {
        let q = query(Strategy::Deep, 3);
        let results = vec![
            result(&q, "p2", 80, "Sin City"),
            result(&q, "p1", 90, "Sin City: A Dame to Kill For"),
            result(&q, "p1", 90, "Sin City"),
        ];

        let selected = select(results, &q);
        let providers: Vec<&str> = selected.iter().map(|r| r.provider.as_str()).collect();
        assert_eq!(providers, ["p1", "p1", "p2"]);
        assert_eq!(titles(&selected)[0], "Sin City");
    }

    #[test]
    fn deep_with_equal_similarity_is_pure_priority() {
        let q = query(Strategy::Deep, 2);
        let results = vec![
            result(&q, "p2", 80, "Sin City"),
            result(&q, "p1", 90, "Sin City"),
        ];

        let selected = select(results, &q);
        assert_eq!(selected[0].provider, "p1");
        assert_eq!(selected[1].provider, "p2");
    }

    #[test]
    fn results_without_record_are_dropped() {
        let q = query(Strategy::Flat, 3);
        let mut empty = result(&q, "a", 50, "ignored");
        empty.record = None;

        let selected = select(vec![empty, result(&q, "b", 50, "Sin City")], &q);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].provider, "b");
    }

    #[test]
    fn exact_imdb_match_ranks_highest() {
        let q = Query::builder(SubjectType::Movie)
            .title("Sin City")
            .imdb_id("tt0401792")
            .build()
            .unwrap();

        let mut by_id = Record::titled("Frank Miller's Sin City");
        by_id.imdb_id = Some("tt0401792".into());
        let by_title = Record::titled("Sin City");

        assert_eq!(rank(&q, &by_id), 1.0);
        assert_eq!(rank(&q, &by_title), 1.0);
        assert!(rank(&q, &Record::titled("Sin City 2")) < 1.0);
    }

    #[test]
    fn missing_text_ranks_zero() {
        let q = Query::builder(SubjectType::Movie)
            .imdb_id("tt0401792")
            .build()
            .unwrap();
        assert_eq!(rank(&q, &Record::titled("Sin City")), 0.0);
        assert_eq!(rank(&query(Strategy::Flat, 1), &Record::default()), 0.0);
    }

    #[test]
    fn person_queries_rank_by_name() {
        let q = Query::builder(SubjectType::Person)
            .name("Frank Miller")
            .build()
            .unwrap();
        assert_eq!(rank(&q, &Record::named("frank  miller")), 1.0);
        assert!(rank(&q, &Record::named("Frank Millerson")) < 1.0);
    }

    #[test]
    fn amount_truncates() {
        let q = query(Strategy::Flat, 1);
        let results = vec![
            result(&q, "a", 50, "Sin City"),
            result(&q, "b", 50, "Sin City"),
        ];
        assert_eq!(select(results, &q).len(), 1);
    }
}
