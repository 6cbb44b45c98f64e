pub mod fragment;

pub use fragment::{identity_literal, in_clause_of, quote_identifier, sql_literal, InClause};
