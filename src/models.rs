use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Author {
    pub id: String, // UUID
    pub name: String,
    pub bio: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Book {
    pub id: String, // UUID
    pub external_id: String,
    pub title: String,
    pub rating: f64,
    pub cover_path: Option<String>,
    pub created_at: i64,
    pub authors: Vec<Author>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Shelf {
    pub id: String, // UUID
    pub user_id: String,
    pub name: String,
}

/// Identity supplied by the external auth layer; the core only treats it as
/// an opaque shelf owner.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
}
