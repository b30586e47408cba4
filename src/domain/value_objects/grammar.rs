use serde::{Deserialize, Serialize};

/// Target grammar a candidate program is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetGrammar {
    Sql,
    NatSql,
}

impl TargetGrammar {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetGrammar::Sql => "sql",
            TargetGrammar::NatSql => "natsql",
        }
    }

    pub fn from_string(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "sql" => Ok(TargetGrammar::Sql),
            "natsql" => Ok(TargetGrammar::NatSql),
            _ => Err(format!("Invalid target grammar: {}", s)),
        }
    }

    /// Whether programs in this grammar can be probed directly against a
    /// database. NatSQL must go through the external NatSQL-to-SQL
    /// conversion before it is executable.
    pub fn is_directly_executable(&self) -> bool {
        matches!(self, TargetGrammar::Sql)
    }
}

impl std::fmt::Display for TargetGrammar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_round_trip() {
        assert_eq!(TargetGrammar::from_string("sql").unwrap(), TargetGrammar::Sql);
        assert_eq!(
            TargetGrammar::from_string("NatSQL").unwrap(),
            TargetGrammar::NatSql
        );
        assert!(TargetGrammar::from_string("prolog").is_err());
    }

    #[test]
    fn test_executability() {
        assert!(TargetGrammar::Sql.is_directly_executable());
        assert!(!TargetGrammar::NatSql.is_directly_executable());
    }
}
