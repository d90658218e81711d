pub mod alerts;
pub mod capture;
pub mod classifier;
pub mod config;
pub mod scanner;
pub mod scheduler;
pub mod signal;
pub mod simulation;
