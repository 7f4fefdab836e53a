pub mod comparison;
pub mod rounding;
pub mod suppression;

pub use comparison::compare_columns;
pub use suppression::{frequency_distribution, suppress_and_round, validate_options};
