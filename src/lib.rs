//! Geollm - Geospatial agent-based simulation with LLM-driven decisions

pub mod agent;
pub mod core;
pub mod llm;
pub mod scenario;
pub mod sim;
