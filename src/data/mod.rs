//! Descriptor files, ground truth and histogram construction

pub mod descriptors;
pub mod ground_truth;
pub mod histogram;

pub use self::descriptors::*;
pub use self::ground_truth::*;
pub use self::histogram::*;
