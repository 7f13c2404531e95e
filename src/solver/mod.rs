//! Dual SVM solver
//!
//! Implements a Sequential Minimal Optimization (SMO) decomposition shared by the
//! binary and one-class support vector machines.

pub mod smo;

pub use self::smo::*;
