pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod storage;
#[cfg(test)]
pub mod test_helpers;
pub mod trading;
