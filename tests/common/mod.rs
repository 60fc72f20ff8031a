pub mod fake_services;
pub mod harness;
pub mod logger;
