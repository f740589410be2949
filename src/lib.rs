pub mod config;
pub mod detection;
pub mod error;
pub mod method;
pub mod planner;
pub mod rng;
pub mod schedule;
pub mod sensor;
pub mod simulation;
pub mod site;
