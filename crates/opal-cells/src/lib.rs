//! Cell type lattice and the append-only arena of symbolic cells.
//!
//! Cells are the symbolic values the rewriting engine manipulates: each has
//! an id, a [`CellType`], and up to three kinds of typed edges to other
//! cells (`has`, `dom`, `cdm`). The arena only ever grows; checkpointing is
//! done with truncation watermarks that mirror the SMT solver's push/pop.

pub mod arena;
pub mod types;
pub mod value;

pub use arena::{Arena, ArenaSnapshot, CellId};
pub use types::CellType;
pub use value::Value;
