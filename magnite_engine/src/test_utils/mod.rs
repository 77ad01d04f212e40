//! Helpers for setting up throwaway databases in tests. Compiled in with the `test_utils` feature so that
//! dependent crates can use them in their own test suites.

mod prepare_env;

pub use prepare_env::{create_database, prepare_test_env, random_db_path, run_migrations};
