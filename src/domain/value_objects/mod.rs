pub mod grammar;
pub mod hardness;
pub mod strategy;
pub mod verdict;

pub use grammar::TargetGrammar;
pub use hardness::Hardness;
pub use strategy::ScoringStrategy;
pub use verdict::Verdict;
