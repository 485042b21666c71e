pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod history;
pub mod reading;
pub mod scheduler;
pub mod synthetic;
pub mod validator;
pub mod view;
