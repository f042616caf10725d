use sqlx::{Sqlite, Transaction};

pub(crate) type Tx<'c> = Transaction<'c, Sqlite>;

/// Whether `err` comes from a UNIQUE (or partial unique index) violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}
