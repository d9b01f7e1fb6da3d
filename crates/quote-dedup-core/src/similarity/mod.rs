pub mod matcher;

pub use matcher::{ratio, similarity, Sequence};
