use rusqlite::{Connection, Result};
use std::path::Path;
use std::time::Duration;

pub fn init_db<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let conn = Connection::open(path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_db_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> Result<()> {
    // Concurrent requests share the database file; queue writers instead of
    // surfacing SQLITE_BUSY, and keep cascading deletes on.
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS authors (
            id TEXT PRIMARY KEY,
            name TEXT UNIQUE NOT NULL,
            bio TEXT,
            created_at INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS books (
            id TEXT PRIMARY KEY,
            external_id TEXT UNIQUE NOT NULL,
            title TEXT NOT NULL,
            rating REAL NOT NULL DEFAULT 0,
            cover_path TEXT,
            created_at INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS book_authors (
            book_id TEXT,
            author_id TEXT,
            PRIMARY KEY (book_id, author_id),
            FOREIGN KEY(book_id) REFERENCES books(id) ON DELETE CASCADE,
            FOREIGN KEY(author_id) REFERENCES authors(id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS shelves (
            id TEXT PRIMARY KEY,
            user_id TEXT UNIQUE NOT NULL,
            name TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS shelf_books (
            shelf_id TEXT,
            book_id TEXT,
            PRIMARY KEY (shelf_id, book_id),
            FOREIGN KEY(shelf_id) REFERENCES shelves(id) ON DELETE CASCADE,
            FOREIGN KEY(book_id) REFERENCES books(id) ON DELETE CASCADE
        )",
        [],
    )?;

    Ok(())
}
