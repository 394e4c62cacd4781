//! Materialized rules.
//!
//! A rule is one `(user, source, trigger)` grouping together with the ids of
//! the owner's active notifications. The database hands back one flat row
//! per notification; [`assemble_rules`] folds those rows into rules and
//! [`RuleSet`] indexes the result by source for the evaluation hot path.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use serde_json::Value;

use crate::types::{DbId, Timestamp};

/// Grouping key of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RuleKey {
    pub user_id: DbId,
    pub source_id: DbId,
    pub trigger_id: DbId,
}

/// One row of the materialization join. `notification_id` is `None` when
/// the owner has no active notifications.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleRow {
    pub user_id: DbId,
    pub source_id: DbId,
    pub trigger_id: DbId,
    pub trigger_type: String,
    pub trigger_params: Value,
    pub notification_id: Option<DbId>,
}

impl RuleRow {
    pub fn key(&self) -> RuleKey {
        RuleKey {
            user_id: self.user_id,
            source_id: self.source_id,
            trigger_id: self.trigger_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rule {
    pub user_id: DbId,
    pub source_id: DbId,
    pub trigger_id: DbId,
    pub trigger_type: String,
    pub trigger_params: Value,
    /// Sorted, no duplicates. May be empty.
    pub notification_ids: Vec<DbId>,
    pub is_active: bool,
}

impl Rule {
    pub fn key(&self) -> RuleKey {
        RuleKey {
            user_id: self.user_id,
            source_id: self.source_id,
            trigger_id: self.trigger_id,
        }
    }
}

/// Fold flat join rows into rules, sorted by key.
///
/// Rows sharing a key contribute their notification ids to one rule; the ids
/// are sorted and deduplicated, so a join that repeats a notification still
/// dispatches it once per match.
pub fn assemble_rules<I>(rows: I) -> Vec<Rule>
where
    I: IntoIterator<Item = RuleRow>,
{
    let mut grouped: BTreeMap<RuleKey, Rule> = BTreeMap::new();

    for row in rows {
        let rule = grouped.entry(row.key()).or_insert_with(|| Rule {
            user_id: row.user_id,
            source_id: row.source_id,
            trigger_id: row.trigger_id,
            trigger_type: row.trigger_type.clone(),
            trigger_params: row.trigger_params.clone(),
            notification_ids: Vec::new(),
            is_active: true,
        });
        if let Some(id) = row.notification_id {
            rule.notification_ids.push(id);
        }
    }

    grouped
        .into_values()
        .map(|mut rule| {
            rule.notification_ids.sort_unstable();
            rule.notification_ids.dedup();
            rule
        })
        .collect()
}

// ---------------------------------------------------------------------------
// RuleSet
// ---------------------------------------------------------------------------

/// Immutable snapshot of every materialized rule.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
    by_source: HashMap<DbId, Vec<usize>>,
    materialized_at: Option<Timestamp>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>, materialized_at: Timestamp) -> Self {
        let mut by_source: HashMap<DbId, Vec<usize>> = HashMap::new();
        for (idx, rule) in rules.iter().enumerate() {
            by_source.entry(rule.source_id).or_default().push(idx);
        }
        Self {
            rules,
            by_source,
            materialized_at: Some(materialized_at),
        }
    }

    /// Snapshot used before the first successful materialization.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot straight from join rows.
    pub fn from_rows<I>(rows: I, materialized_at: Timestamp) -> Self
    where
        I: IntoIterator<Item = RuleRow>,
    {
        Self::new(assemble_rules(rows), materialized_at)
    }

    pub fn for_source(&self, source_id: DbId) -> impl Iterator<Item = &Rule> {
        self.by_source
            .get(&source_id)
            .into_iter()
            .flatten()
            .map(|&idx| &self.rules[idx])
    }

    pub fn for_user(&self, user_id: DbId) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(move |r| r.user_id == user_id)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// `None` until the first successful materialization.
    pub fn materialized_at(&self) -> Option<Timestamp> {
        self.materialized_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(user: DbId, source: DbId, trigger: DbId, notification: Option<DbId>) -> RuleRow {
        RuleRow {
            user_id: user,
            source_id: source,
            trigger_id: trigger,
            trigger_type: "temperature".into(),
            trigger_params: json!({"temp": 30, "op": ">"}),
            notification_id: notification,
        }
    }

    #[test]
    fn groups_rows_by_key() {
        let rules = assemble_rules(vec![
            row(1, 10, 100, Some(7)),
            row(2, 20, 200, Some(9)),
            row(1, 10, 100, Some(5)),
            row(1, 11, 100, Some(5)),
        ]);

        assert_eq!(rules.len(), 3);
        assert_eq!(rules[0].key(), RuleKey { user_id: 1, source_id: 10, trigger_id: 100 });
        assert_eq!(rules[0].notification_ids, vec![5, 7]);
        assert_eq!(rules[1].source_id, 11);
        assert_eq!(rules[2].user_id, 2);
        assert!(rules.iter().all(|r| r.is_active));
    }

    #[test]
    fn duplicate_notification_ids_collapse() {
        let rules = assemble_rules(vec![
            row(1, 10, 100, Some(3)),
            row(1, 10, 100, Some(3)),
            row(1, 10, 100, Some(1)),
            row(1, 10, 100, Some(3)),
        ]);
        assert_eq!(rules[0].notification_ids, vec![1, 3]);
    }

    #[test]
    fn rule_without_notifications_is_kept() {
        let rules = assemble_rules(vec![row(1, 10, 100, None)]);
        assert_eq!(rules.len(), 1);
        assert!(rules[0].notification_ids.is_empty());
    }

    #[test]
    fn assembly_is_order_independent() {
        let rows = vec![
            row(1, 10, 100, Some(2)),
            row(1, 10, 101, None),
            row(3, 30, 300, Some(8)),
            row(1, 10, 100, Some(1)),
        ];
        let mut reversed = rows.clone();
        reversed.reverse();
        assert_eq!(assemble_rules(rows), assemble_rules(reversed));
    }

    #[test]
    fn rule_set_indexes_by_source_and_user() {
        let set = RuleSet::from_rows(
            vec![
                row(1, 10, 100, Some(1)),
                row(1, 10, 101, Some(1)),
                row(1, 11, 100, Some(1)),
                row(2, 20, 200, None),
            ],
            chrono::Utc::now(),
        );

        assert_eq!(set.len(), 4);
        assert_eq!(set.for_source(10).count(), 2);
        assert_eq!(set.for_source(11).count(), 1);
        assert_eq!(set.for_source(99).count(), 0);
        assert_eq!(set.for_user(1).count(), 3);
        assert_eq!(set.for_user(2).count(), 1);
        assert!(set.materialized_at().is_some());
    }

    #[test]
    fn empty_set_has_no_timestamp() {
        let set = RuleSet::empty();
        assert!(set.is_empty());
        assert!(set.materialized_at().is_none());
        assert_eq!(set.for_source(1).count(), 0);
    }
}
