use std::str::FromStr;

use sqlx::{sqlite::{SqliteConnectOptions, SqlitePoolOptions}, SqlitePool};

// unique: name
const PARTICIPANTS: &str = "CREATE TABLE IF NOT EXISTS participants (
    name TEXT PRIMARY KEY NOT NULL,
    last_status INTEGER NOT NULL
)";

// append-only, id order is log order
const MESSAGES: &str = "CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    sender TEXT NOT NULL,
    recipient TEXT NOT NULL,
    text TEXT NOT NULL,
    kind TEXT NOT NULL,
    time TEXT NOT NULL
)";

pub async fn connect(url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let db_pool = SqlitePoolOptions::new()
        .max_connections(16)
        .connect_with(options)
        .await?;

    migrate(&db_pool).await?;
    Ok(db_pool)
}

/// A private in-memory database. Kept on one connection that never expires, since every
/// sqlite memory connection is its own database.
pub async fn memory() -> Result<SqlitePool, sqlx::Error> {
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    migrate(&db_pool).await?;
    Ok(db_pool)
}

pub async fn migrate(db_pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(PARTICIPANTS).execute(db_pool).await?;
    sqlx::query(MESSAGES).execute(db_pool).await?;
    Ok(())
}
