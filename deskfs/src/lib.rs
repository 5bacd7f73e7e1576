pub mod config;
pub mod engine;
pub mod logging;
pub mod paths;
pub mod retry;
pub mod runtime;
pub mod service;
pub mod storage;
pub mod validation;
