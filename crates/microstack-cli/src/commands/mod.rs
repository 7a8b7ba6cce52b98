pub mod config;
pub mod info;
pub mod montage;
pub mod pipeline;
