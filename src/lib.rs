pub mod batch;
pub mod benchmark;
pub mod capture;
pub mod config;
pub mod dimensionality;
pub mod program;
pub mod report;
pub mod shaders;
pub mod texture;
pub mod vulkan_util;
pub mod window;
