//! Engine core: scoring, the hunting loop, the worker pool, and the
//! orchestrator that composes them.

pub mod hunter;
pub mod orchestrator;
pub mod pool;
pub mod scorer;

pub use hunter::HuntingLoop;
pub use orchestrator::Orchestrator;
pub use pool::WorkerPool;
