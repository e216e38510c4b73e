pub mod parser;
pub mod pipeline;

pub use parser::PrintJob;
pub use pipeline::{submit, Submitted};
