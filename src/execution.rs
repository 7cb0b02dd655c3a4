//! Execution adapter contract and the batch rule for statements that must affect rows.

use tracing::{debug, warn};

use crate::statement::Statement;

/// Runs generated statements against a database connection.
///
/// Driver failures are reported through `Error` and are never wrapped.
pub trait ExecutionAdapter {
    type Error: std::error::Error + Send + Sync + 'static;

    fn begin(&mut self) -> Result<(), Self::Error>;

    /// Executes one statement and returns the number of affected rows.
    fn execute(&mut self, statement: &Statement) -> Result<u64, Self::Error>;

    fn commit(&mut self) -> Result<(), Self::Error>;

    fn rollback(&mut self) -> Result<(), Self::Error>;
}

/// Result of running a batch of statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutionOutcome {
    pub affected: u64,
    pub committed: bool,
}

/// Runs `statements` in order, optionally inside one transaction.
///
/// A statement flagged `must_affect_rows` that touches no row stops the batch;
/// the transaction is rolled back and the outcome reports zero affected rows.
pub fn execute_statements<A: ExecutionAdapter>(
    adapter: &mut A,
    statements: &[Statement],
    use_transaction: bool,
) -> Result<ExecutionOutcome, A::Error> {
    if statements.is_empty() {
        return Ok(ExecutionOutcome::default());
    }
    if use_transaction {
        adapter.begin()?;
    }

    let mut affected = 0u64;
    for statement in statements {
        let rows = match adapter.execute(statement) {
            Ok(rows) => rows,
            Err(err) => {
                if use_transaction {
                    // the driver error is the one reported
                    let _ = adapter.rollback();
                }
                return Err(err);
            }
        };
        debug!(text = %statement.text, rows, "executed statement");
        if statement.must_affect_rows && rows == 0 {
            warn!(text = %statement.text, "statement affected no rows, stopping batch");
            if use_transaction {
                adapter.rollback()?;
            }
            return Ok(ExecutionOutcome {
                affected: 0,
                committed: false,
            });
        }
        affected += rows;
    }

    if use_transaction {
        adapter.commit()?;
    }
    Ok(ExecutionOutcome {
        affected,
        committed: true,
    })
}
