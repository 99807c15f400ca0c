pub mod runner;

pub use runner::{RunnerConfig, StrategyRunner};
