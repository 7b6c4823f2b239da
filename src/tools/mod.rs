pub mod calculator;
pub mod formula;

pub use calculator::Calculator;
pub use formula::{Formula, FormulaLookup};
