pub mod config;
pub mod demo;
mod render;
