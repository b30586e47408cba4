use serde::{Deserialize, Serialize};

/// One retained table with its retained columns, in relevance order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrunedTable {
    pub name: String,
    pub columns: Vec<String>,
}

/// The generator-ready view of one question: the question text plus the
/// pruned schema, serialized into a deterministic skeleton string.
///
/// Invariants (enforced by the pruner, checked in its tests): every
/// retained column's parent table is retained; table/column counts stay
/// within the configured k values except for force-included key columns;
/// ordering is by descending relevance with a stable tie-break on
/// declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrunedInput {
    question: String,
    tables: Vec<PrunedTable>,
    skeleton: String,
}

impl PrunedInput {
    pub fn new(question: impl Into<String>, tables: Vec<PrunedTable>) -> Self {
        let question = question.into();
        let skeleton = Self::serialize_skeleton(&question, &tables);
        Self {
            question,
            tables,
            skeleton,
        }
    }

    /// RESDSQL-style serialization:
    /// `question | table : col1 , col2 | table2 : col1`.
    fn serialize_skeleton(question: &str, tables: &[PrunedTable]) -> String {
        let mut skeleton = String::from(question.trim());
        for table in tables {
            skeleton.push_str(" | ");
            skeleton.push_str(&table.name);
            if !table.columns.is_empty() {
                skeleton.push_str(" : ");
                skeleton.push_str(&table.columns.join(" , "));
            }
        }
        skeleton
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn tables(&self) -> &[PrunedTable] {
        &self.tables
    }

    pub fn skeleton(&self) -> &str {
        &self.skeleton
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skeleton_serialization() {
        let input = PrunedInput::new(
            "How many singers are there?",
            vec![
                PrunedTable {
                    name: "singer".to_string(),
                    columns: vec!["singer_id".to_string(), "name".to_string()],
                },
                PrunedTable {
                    name: "concert".to_string(),
                    columns: vec!["concert_id".to_string()],
                },
            ],
        );

        assert_eq!(
            input.skeleton(),
            "How many singers are there? | singer : singer_id , name | concert : concert_id"
        );
    }

    #[test]
    fn test_skeleton_without_tables() {
        let input = PrunedInput::new("  trimmed question  ", vec![]);
        assert_eq!(input.skeleton(), "trimmed question");
    }

    #[test]
    fn test_skeleton_is_deterministic() {
        let build = || {
            PrunedInput::new(
                "q",
                vec![PrunedTable {
                    name: "t".to_string(),
                    columns: vec!["a".to_string(), "b".to_string()],
                }],
            )
        };
        assert_eq!(build().skeleton(), build().skeleton());
    }
}
