//! Checks, their collaborators and the pipeline that runs them.

pub mod bytecode;
pub mod checks;
pub mod compiler;
pub mod explorer;
pub mod git;
pub mod governance;
pub mod pipeline;
pub mod providers;
