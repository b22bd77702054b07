pub mod resolver;
pub mod scoring;
