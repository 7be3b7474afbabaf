pub mod assembler;

pub use assembler::{assemble, AssemblyStats};
