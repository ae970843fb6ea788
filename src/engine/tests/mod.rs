pub mod helpers;

mod tests_persistence;
mod tests_recovery;
