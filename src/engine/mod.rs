pub mod book;
pub mod clearing;
pub mod eligibility;
pub mod matcher;

pub use matcher::{run_matching, MatchingInputs};
