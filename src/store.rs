use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Result};
use uuid::Uuid;

use crate::db;
use crate::models::{Author, Book, Shelf};

/// Repository for all library rows. Business logic stays in the ingest layer;
/// every statement the crate runs lives here, and every get-or-create is an
/// INSERT OR IGNORE against a uniqueness constraint followed by a re-read, so
/// concurrent callers converge on one row instead of surfacing a constraint
/// violation.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(db::init_db(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(db::init_db_in_memory()?))
    }

    pub fn find_book_by_external_id(&self, external_id: &str) -> Result<Option<Book>> {
        let book = self
            .conn
            .query_row(
                "SELECT id, external_id, title, rating, cover_path, created_at \
                 FROM books WHERE external_id = ?1",
                params![external_id],
                |row| {
                    Ok(Book {
                        id: row.get(0)?,
                        external_id: row.get(1)?,
                        title: row.get(2)?,
                        rating: row.get(3)?,
                        cover_path: row.get(4)?,
                        created_at: row.get(5)?,
                        authors: Vec::new(),
                    })
                },
            )
            .optional()?;
        match book {
            Some(mut book) => {
                book.authors = self.book_authors(&book.id)?;
                Ok(Some(book))
            }
            None => Ok(None),
        }
    }

    /// Atomic get-or-create keyed by `external_id`. Returns the row and
    /// whether this call created it; a concurrent loser observes the winner's
    /// row with `created = false`.
    pub fn insert_book_if_absent(&self, external_id: &str, title: &str) -> Result<(Book, bool)> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO books (id, external_id, title, rating, created_at) \
             VALUES (?1, ?2, ?3, 0, ?4)",
            params![
                Uuid::new_v4().to_string(),
                external_id,
                title,
                chrono::Utc::now().timestamp_millis(),
            ],
        )?;
        match self.find_book_by_external_id(external_id)? {
            Some(book) => Ok((book, inserted == 1)),
            None => Err(rusqlite::Error::QueryReturnedNoRows),
        }
    }

    pub fn get_or_create_author(&self, name: &str, bio: Option<&str>) -> Result<Author> {
        self.conn.execute(
            "INSERT OR IGNORE INTO authors (id, name, bio, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                Uuid::new_v4().to_string(),
                name,
                bio,
                chrono::Utc::now().timestamp_millis(),
            ],
        )?;
        self.conn.query_row(
            "SELECT id, name, bio FROM authors WHERE name = ?1",
            params![name],
            |row| {
                Ok(Author {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    bio: row.get(2)?,
                })
            },
        )
    }

    pub fn replace_book_authors(&self, book_id: &str, authors: &[Author]) -> Result<()> {
        self.conn.execute(
            "DELETE FROM book_authors WHERE book_id = ?1",
            params![book_id],
        )?;
        for author in authors {
            self.conn.execute(
                "INSERT OR IGNORE INTO book_authors (book_id, author_id) VALUES (?1, ?2)",
                params![book_id, author.id],
            )?;
        }
        Ok(())
    }

    pub fn book_authors(&self, book_id: &str) -> Result<Vec<Author>> {
        let mut stmt = self.conn.prepare(
            "SELECT authors.id, authors.name, authors.bio FROM book_authors \
             JOIN authors ON authors.id = book_authors.author_id \
             WHERE book_authors.book_id = ?1 \
             ORDER BY authors.name",
        )?;
        let rows = stmt.query_map(params![book_id], |row| {
            Ok(Author {
                id: row.get(0)?,
                name: row.get(1)?,
                bio: row.get(2)?,
            })
        })?;
        let mut authors = Vec::new();
        for row in rows {
            authors.push(row?);
        }
        Ok(authors)
    }

    pub fn set_book_cover(&self, book_id: &str, cover_path: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE books SET cover_path = ?1 WHERE id = ?2",
            params![cover_path, book_id],
        )?;
        Ok(())
    }

    pub fn get_or_create_shelf(&self, user_id: &str, name: &str) -> Result<Shelf> {
        self.conn.execute(
            "INSERT OR IGNORE INTO shelves (id, user_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                Uuid::new_v4().to_string(),
                user_id,
                name,
                chrono::Utc::now().timestamp_millis(),
            ],
        )?;
        self.conn.query_row(
            "SELECT id, user_id, name FROM shelves WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok(Shelf {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    name: row.get(2)?,
                })
            },
        )
    }

    /// Set-union add; returns whether the membership row was new.
    pub fn add_book_to_shelf(&self, shelf_id: &str, book_id: &str) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO shelf_books (shelf_id, book_id) VALUES (?1, ?2)",
            params![shelf_id, book_id],
        )?;
        Ok(inserted == 1)
    }

    pub fn shelf_books(&self, shelf_id: &str) -> Result<Vec<Book>> {
        let mut stmt = self.conn.prepare(
            "SELECT books.id, books.external_id, books.title, books.rating, \
             books.cover_path, books.created_at \
             FROM shelf_books \
             JOIN books ON books.id = shelf_books.book_id \
             WHERE shelf_books.shelf_id = ?1 \
             ORDER BY books.title",
        )?;
        let rows = stmt.query_map(params![shelf_id], |row| {
            Ok(Book {
                id: row.get(0)?,
                external_id: row.get(1)?,
                title: row.get(2)?,
                rating: row.get(3)?,
                cover_path: row.get(4)?,
                created_at: row.get(5)?,
                authors: Vec::new(),
            })
        })?;
        let mut books = Vec::new();
        for row in rows {
            books.push(row?);
        }
        for book in &mut books {
            book.authors = self.book_authors(&book.id)?;
        }
        Ok(books)
    }

    pub fn shelf_book_count(&self, shelf_id: &str) -> Result<i64> {
        self.conn.query_row(
            "SELECT COUNT(*) FROM shelf_books WHERE shelf_id = ?1",
            params![shelf_id],
            |row| row.get(0),
        )
    }

    /// Deletes the row; join rows cascade. Cover-file cleanup is the ingest
    /// layer's job, which is why the caller needs the book first.
    pub fn delete_book(&self, book_id: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM books WHERE id = ?1", params![book_id])?;
        Ok(deleted > 0)
    }

    pub fn book_count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))
    }

    pub fn author_count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM authors", [], |row| row.get(0))
    }
}
