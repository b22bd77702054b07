pub mod backend;
pub mod reply;
