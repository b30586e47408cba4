use serde::{Deserialize, Serialize};

/// Query hardness bucket used for the per-hardness evaluation breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hardness {
    Easy,
    Medium,
    Hard,
    Extra,
}

impl Hardness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Hardness::Easy => "easy",
            Hardness::Medium => "medium",
            Hardness::Hard => "hard",
            Hardness::Extra => "extra",
        }
    }

    /// Classify a SQL query by structural component count. Joins,
    /// aggregations, grouping, ordering, and nesting each raise the
    /// score; nesting counts double.
    pub fn classify(sql: &str) -> Self {
        let lowered = sql.to_lowercase();

        let count_of = |needle: &str| lowered.matches(needle).count();

        let joins = count_of(" join ");
        let aggregates = ["count(", "sum(", "avg(", "max(", "min("]
            .iter()
            .map(|agg| count_of(agg))
            .sum::<usize>();
        let grouping = count_of("group by");
        let ordering = count_of("order by");
        let set_ops = count_of("union") + count_of("intersect") + count_of("except");
        // Every SELECT beyond the first indicates nesting or a set operation.
        let nesting = count_of("select").saturating_sub(1);
        let conditions = count_of(" and ") + count_of(" or ");

        let score =
            joins + aggregates + grouping + ordering + conditions + set_ops + nesting * 2;

        match score {
            0 => Hardness::Easy,
            1..=2 => Hardness::Medium,
            3..=4 => Hardness::Hard,
            _ => Hardness::Extra,
        }
    }
}

impl std::fmt::Display for Hardness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
