//! Cross-validation experiments

pub mod datasets;
pub mod folds;
pub mod grid;
pub mod runner;

pub use self::datasets::*;
pub use self::folds::*;
pub use self::grid::*;
pub use self::runner::*;
