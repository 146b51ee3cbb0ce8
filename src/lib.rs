pub mod admin;
pub mod auth;
pub mod config;
pub mod gate;
pub mod handler;
pub mod id;
pub mod model;
pub mod resolver;
pub mod store;
pub mod synth;
pub mod util;
