pub mod chart;
pub mod config;
pub mod mappings;
pub mod score;
