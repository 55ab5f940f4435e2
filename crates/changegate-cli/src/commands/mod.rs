pub mod branch;
pub mod context;
pub mod data;
pub mod history;
pub mod preview;
pub mod schema;
pub mod workflow;
