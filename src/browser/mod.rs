pub mod dom;
pub mod page;
pub mod session;
