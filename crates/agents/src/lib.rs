//! Agent-side building blocks for CourseCraft: the context assembler, the
//! pure routing function, and the deterministic specialist drafting agents.

pub mod assembler;
pub mod drafting;
pub mod router;

pub use assembler::ContextAssembler;
pub use drafting::DraftingInvoker;
pub use router::{classify, route};
