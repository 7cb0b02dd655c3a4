//! Translates dialect-independent query and command objects into parameterized SQLite statements.

pub mod ast;
pub mod command;
pub mod condition;
pub mod config;
pub mod dialect;
pub mod error;
pub mod execution;
pub mod naming;
pub mod params;
pub mod schema;
pub mod statement;
pub mod translator;

pub use ast::Query;
pub use command::Command;
pub use error::{DispatchError, DispatchResult};
pub use statement::{Statement, StatementGenerator};
pub use translator::{TranslationContext, TranslationResult};
