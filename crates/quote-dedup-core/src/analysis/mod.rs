pub mod duplicates;
pub mod merge;
