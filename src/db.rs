use sqlx::PgPool;
use tracing::{debug, info, instrument};

const INIT_SCHEMA: &str = include_str!("../migrations/0001_init.sql");

/// SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

/// Applies the schema. Every statement is idempotent so this runs on each start.
#[instrument(skip(pool))]
pub async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    let statements = schema_statements(INIT_SCHEMA);
    for statement in &statements {
        sqlx::query(statement).execute(pool).await?;
    }

    info!(statements = statements.len(), "Database schema applied");
    Ok(())
}

fn schema_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|statement| !statement.is_empty())
        .collect()
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    let violated = err
        .as_database_error()
        .and_then(|db_err| db_err.code())
        .is_some_and(|code| code == UNIQUE_VIOLATION);

    if violated {
        debug!(error = %err, "Unique constraint violated");
    }
    violated
}
