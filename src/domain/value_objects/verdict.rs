use serde::{Deserialize, Serialize};

/// Validity verdict for a program, as established by the execute-or-parse
/// probe. Probe diagnostics travel separately on the correction attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Valid,
    Invalid,
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid)
    }

    pub fn from_probe_success(success: bool) -> Self {
        if success { Verdict::Valid } else { Verdict::Invalid }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Valid => write!(f, "valid"),
            Verdict::Invalid => write!(f, "invalid"),
        }
    }
}
