//! Integration test entry point.

mod mock_source;
mod mock_worker;
mod scenarios;
