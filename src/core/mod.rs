pub mod error;

pub use error::{RetryError, StrategyResult};
