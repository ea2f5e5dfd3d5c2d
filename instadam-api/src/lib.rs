pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod imaging;
pub mod models;
pub mod openapi;
pub mod routes;
pub mod storage;
pub mod validation;
pub mod zip_import;
