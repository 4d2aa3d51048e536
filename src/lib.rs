pub mod auth;
pub mod billing;
pub mod catalog;
pub mod companies;
pub mod config;
pub mod contacts;
pub mod editorial;
pub mod error;
pub mod extractor;
pub mod releases;
pub mod routes;
