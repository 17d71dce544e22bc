pub mod block;
pub mod clock;
pub mod config;
pub mod daemon;
pub mod data_storage;
pub mod engine;
pub mod export;
pub mod idle;
pub mod messages;
pub mod observer;
pub mod runtime;
pub mod view;
