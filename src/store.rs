//! Persistent landmark cache.
//!
//! Maps an image filename to the landmarks detected on that file, so repeated
//! runs over the same images skip detection. Records live in a single SQLite
//! table; the points are a bincode blob that decodes back to the exact same
//! `f32` values.

use std::path::Path;

use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use crate::error::{Error, Result};
use crate::types::{Point, Shape};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS entries (
    id     INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    name   TEXT NOT NULL UNIQUE,
    points BLOB NOT NULL
)";

/// Handle to the landmark table.
///
/// Owns its connection: dropping the store closes it. Use [`LandmarkStore::close`]
/// when close errors should be surfaced.
pub struct LandmarkStore {
    conn: Connection,
}

impl LandmarkStore {
    /// Open (creating if needed) a store backed by a file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        log::debug!("Opened landmark store {}", path.as_ref().display());
        Self::with_connection(conn)
    }

    /// A store that lives only as long as the handle.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Landmarks stored for `name`, or `None` when the file was never seen.
    pub fn get(&self, name: &str) -> Result<Option<Shape>> {
        let blob: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT points FROM entries WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        match blob {
            Some(bytes) => Ok(Some(decode_points(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Insert landmarks for a file that has no record yet.
    pub fn put(&self, name: &str, shape: &Shape) -> Result<()> {
        let blob = encode_points(shape)?;
        match self.conn.execute(
            "INSERT INTO entries (name, points) VALUES (?1, ?2)",
            params![name, blob],
        ) {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(Error::DuplicateEntry(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Insert or overwrite the landmarks for `name`.
    ///
    /// Nothing calls this implicitly: stale records stay until a caller asks
    /// for re-extraction.
    pub fn replace(&self, name: &str, shape: &Shape) -> Result<()> {
        let blob = encode_points(shape)?;
        self.conn.execute(
            "INSERT INTO entries (name, points) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET points = excluded.points",
            params![name, blob],
        )?;
        Ok(())
    }

    pub fn contains(&self, name: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row("SELECT id FROM entries WHERE name = ?1", params![name], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }

    pub fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Close the connection, reporting any error SQLite raises on close.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| Error::Store(e))
    }
}

fn encode_points(shape: &Shape) -> Result<Vec<u8>> {
    Ok(bincode::serialize(&shape.points)?)
}

fn decode_points(bytes: &[u8]) -> Result<Shape> {
    let points: Vec<Point> = bincode::deserialize(bytes)?;
    Ok(Shape::new(points))
}
