pub mod types;

pub use types::{
    CheckReport, Finding, IngredientViolation, Spanned, TextPosition, ViolationItem,
};
