//! Services for topic standardization

pub mod classifier;
pub mod completion_client;
pub mod standardizer;
