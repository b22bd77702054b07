pub mod executor;
pub mod journal;
pub mod pipelines;
pub mod tracker;
