//! SVN dump stream parsing: spec.md §4.3.

pub mod lexer;
pub mod parser;

pub use lexer::{ByteLexer, Lexer};
pub use parser::{parse, DumpParseResult};
