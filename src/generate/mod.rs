pub mod artifacts;
pub mod locators;
pub mod steps;
