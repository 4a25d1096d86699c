pub mod batch;
pub mod fare;
pub mod fetch;
pub mod generator;
pub mod ids;
pub mod infra;
pub mod model;
pub mod output;
pub mod parser;
pub mod pricing;
pub mod publish;
pub mod report;
pub mod services;
pub mod store;
