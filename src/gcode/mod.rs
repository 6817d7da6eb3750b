pub mod parser;

pub use parser::{Code, InvalidNumber, Line, ParseError, Parser, parse_line};
