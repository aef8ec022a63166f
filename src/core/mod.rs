//! Core domain models and business logic for authentication and authorization

pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod db;
pub mod http;
pub mod registry;
pub mod users;
