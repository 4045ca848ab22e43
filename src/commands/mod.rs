pub mod clean;
mod common;
pub mod reorganize;
pub mod run;
pub mod validate;
