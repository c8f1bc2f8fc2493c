pub mod answer;
pub mod batch;
pub mod candidates;
pub mod capabilities;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod interactions;
pub mod pipeline;
pub mod prompt;
pub mod run_config;
pub mod runners;
pub mod scoring;
pub mod stages;
pub mod structure;
pub mod supervisor;
pub mod tools;
