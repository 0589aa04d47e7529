// Library exports for a3mfold
pub mod a3m;
pub mod binary_paths;
pub mod chain_registry;
pub mod config;
pub mod error;
pub mod fold_input;
pub mod hit_table;
pub mod partition;
pub mod pipeline;
pub mod search;
pub mod taxonomy;
