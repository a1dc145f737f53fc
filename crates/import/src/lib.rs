pub mod csv;
pub mod match_engine;
pub mod similarity;
pub mod statement;

pub use csv::{read_rows, CsvError};
pub use match_engine::{MatchCandidate, MatchScorer};
pub use statement::{normalize_row, normalize_rows, ColumnMapping, Direction, RawRow, RawValue};
