pub mod config;
pub(crate) mod config_env;
pub mod llm;
pub mod models;
pub mod postcard;
