//! Concrete collaborators: local CSV files and the back-office HTTP API.

pub mod backoffice;
pub mod files;
