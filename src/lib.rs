pub mod config;
pub mod feed;
pub mod inventory;
pub mod limiter;
pub mod mapping;
pub mod model;
pub mod pagination;
pub mod pipeline;
pub mod rotator;
pub mod store;
pub mod walker;
pub mod writer;
