pub mod config;
pub mod conversation;
pub mod error;
pub mod http_client;
pub mod llm_client;
pub mod local_engine;
pub mod persona;
pub mod remote;
pub mod resolver;
pub mod runtime;
pub mod server;
