pub mod agent_runner;
pub mod domain;
pub mod model;
pub mod repository;
pub mod services;
