pub mod annotation;
pub mod buffer;
pub mod consts;
pub mod correction;
pub mod crop;
pub mod error;
pub mod export;
pub mod image_stack;
pub mod io;
pub mod montage;
pub mod pipeline;
