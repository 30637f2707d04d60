//! Jira API client.
//!
//! Outbound HTTP against the Jira REST and Agile surfaces, with every
//! outcome normalized into a success payload or a uniform failure value.

mod auth;
mod client;
mod error;
pub mod types;

pub use client::JiraClient;
pub use error::ApiFailure;
