use std::cmp::Ordering;

use crate::domain::entities::{PrunedInput, PrunedTable, ScoredSchemaItem};

/// Top-k schema pruning: keep the `k_table` most relevant tables and,
/// per kept table, the `k_column` most relevant columns. Primary and
/// foreign key columns of kept tables are always retained even when
/// they fall outside the top-k.
///
/// Pure function of its inputs: no randomness, no shared state, and a
/// byte-for-byte identical skeleton across repeated runs.
#[derive(Debug, Clone)]
pub struct SchemaPruner {
    k_table: usize,
    k_column: usize,
}

impl SchemaPruner {
    pub fn new(k_table: usize, k_column: usize) -> Self {
        Self { k_table, k_column }
    }

    pub fn k_table(&self) -> usize {
        self.k_table
    }

    pub fn k_column(&self) -> usize {
        self.k_column
    }

    pub fn prune(&self, question: &str, scored_items: &[ScoredSchemaItem]) -> PrunedInput {
        let mut tables: Vec<&ScoredSchemaItem> = scored_items
            .iter()
            .filter(|scored| scored.item().is_table())
            .collect();
        sort_by_relevance(&mut tables);
        tables.truncate(self.k_table);

        let pruned_tables = tables
            .iter()
            .map(|table| {
                let table_name = table.item().identifier();

                let mut columns: Vec<&ScoredSchemaItem> = scored_items
                    .iter()
                    .filter(|scored| {
                        scored.item().is_column() && scored.item().table_name() == table_name
                    })
                    .collect();
                sort_by_relevance(&mut columns);

                let mut kept: Vec<&ScoredSchemaItem> =
                    columns.iter().take(self.k_column).copied().collect();

                // Force-include key columns that fell outside the top-k,
                // in declaration order after the ranked ones.
                let mut forced: Vec<&ScoredSchemaItem> = columns
                    .iter()
                    .skip(self.k_column)
                    .filter(|scored| scored.item().is_key())
                    .copied()
                    .collect();
                forced.sort_by_key(|scored| scored.item().declaration_index());
                kept.extend(forced);

                PrunedTable {
                    name: table_name.to_string(),
                    columns: kept
                        .iter()
                        .filter_map(|scored| scored.item().column_name())
                        .map(str::to_string)
                        .collect(),
                }
            })
            .collect();

        PrunedInput::new(question, pruned_tables)
    }
}

/// Descending probability, stable tie-break on original schema order.
fn sort_by_relevance(items: &mut [&ScoredSchemaItem]) {
    items.sort_by(|a, b| {
        b.probability()
            .partial_cmp(&a.probability())
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.item().declaration_index().cmp(&b.item().declaration_index()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::SchemaItem;
    use crate::domain::value_objects::ScoringStrategy;

    fn scored(item: SchemaItem, probability: f64) -> ScoredSchemaItem {
        ScoredSchemaItem::new(item, probability, ScoringStrategy::Gated)
    }

    fn sample_items() -> Vec<ScoredSchemaItem> {
        vec![
            scored(SchemaItem::table("stadium", 0), 0.9),
            scored(SchemaItem::table("singer", 1), 0.7),
            scored(SchemaItem::table("concert", 2), 0.4),
            scored(
                SchemaItem::column("stadium", "stadium_id", None, 3).with_primary_key(true),
                0.8,
            ),
            scored(SchemaItem::column("stadium", "name", None, 4), 0.6),
            scored(SchemaItem::column("stadium", "capacity", None, 5), 0.5),
            scored(SchemaItem::column("stadium", "location", None, 6), 0.3),
            scored(SchemaItem::column("singer", "singer_id", None, 7), 0.7),
            scored(SchemaItem::column("singer", "name", None, 8), 0.6),
            scored(SchemaItem::column("concert", "concert_id", None, 9), 0.4),
        ]
    }

    #[test]
    fn test_table_and_column_budgets_hold() {
        let pruner = SchemaPruner::new(2, 2);
        let pruned = pruner.prune("q", &sample_items());

        assert!(pruned.tables().len() <= 2);
        for table in pruned.tables() {
            assert!(table.columns.len() <= 2);
        }
    }

    #[test]
    fn test_tables_ranked_by_probability() {
        let pruner = SchemaPruner::new(2, 3);
        let pruned = pruner.prune("q", &sample_items());

        let names: Vec<&str> = pruned.tables().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["stadium", "singer"]);
    }

    #[test]
    fn test_columns_ranked_within_table() {
        let pruner = SchemaPruner::new(1, 2);
        let pruned = pruner.prune("q", &sample_items());

        assert_eq!(pruned.tables()[0].columns, ["stadium_id", "name"]);
    }

    #[test]
    fn test_key_columns_forced_past_budget() {
        let mut items = sample_items();
        // Push the primary key to the bottom of the ranking.
        items[3] = scored(
            SchemaItem::column("stadium", "stadium_id", None, 3).with_primary_key(true),
            0.01,
        );

        let pruner = SchemaPruner::new(1, 2);
        let pruned = pruner.prune("q", &items);

        let columns = &pruned.tables()[0].columns;
        assert!(columns.contains(&"stadium_id".to_string()));
        // Budget plus one forced key.
        assert_eq!(columns.len(), 3);
        assert_eq!(columns.as_slice(), ["name", "capacity", "stadium_id"]);
    }

    #[test]
    fn test_foreign_key_forced_like_primary() {
        let items = vec![
            scored(SchemaItem::table("singer", 0), 0.9),
            scored(SchemaItem::column("singer", "name", None, 1), 0.9),
            scored(SchemaItem::column("singer", "age", None, 2), 0.8),
            scored(
                SchemaItem::column("singer", "stadium_id", None, 3)
                    .with_foreign_key_refs(vec!["stadium.stadium_id".to_string()]),
                0.05,
            ),
        ];

        let pruner = SchemaPruner::new(1, 2);
        let pruned = pruner.prune("q", &items);

        assert!(
            pruned.tables()[0]
                .columns
                .contains(&"stadium_id".to_string())
        );
    }

    #[test]
    fn test_parent_table_always_retained() {
        let pruner = SchemaPruner::new(2, 3);
        let pruned = pruner.prune("q", &sample_items());

        let retained: Vec<&str> = pruned.tables().iter().map(|t| t.name.as_str()).collect();
        for table in pruned.tables() {
            assert!(retained.contains(&table.name.as_str()));
            // Columns were grouped under their own parent by construction.
            assert!(!table.columns.is_empty());
        }
    }

    #[test]
    fn test_stable_tie_break_on_declaration_order() {
        let items = vec![
            scored(SchemaItem::table("b_table", 0), 0.5),
            scored(SchemaItem::table("a_table", 1), 0.5),
        ];

        let pruner = SchemaPruner::new(1, 1);
        let pruned = pruner.prune("q", &items);

        // Equal probability: declaration order wins, not name order.
        assert_eq!(pruned.tables()[0].name, "b_table");
    }

    #[test]
    fn test_determinism_byte_for_byte() {
        let pruner = SchemaPruner::new(2, 2);
        let items = sample_items();

        let first = pruner.prune("How many singers?", &items);
        let second = pruner.prune("How many singers?", &items);

        assert_eq!(first.skeleton(), second.skeleton());
        assert_eq!(first, second);
    }

    #[test]
    fn test_k_larger_than_schema() {
        let pruner = SchemaPruner::new(10, 10);
        let pruned = pruner.prune("q", &sample_items());

        assert_eq!(pruned.tables().len(), 3);
    }
}
