//! Section-level and global mesh assembly.

pub mod assembler;
pub mod section;

pub use assembler::Assembler;
pub use section::AssemblySection;
