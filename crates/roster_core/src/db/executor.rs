//! Category-checked statement execution.
//!
//! Every statement is tokenized on whitespace before it runs. A token equal
//! (case-insensitively) to an operation keyword outside the statement's
//! category rejects the whole statement. `SELECT` is always allowed so that
//! subqueries keep working in every category.

use super::{DbError, DbResult};
use log::debug;
use rusqlite::{Connection, Params, Row};

const OPERATION_KEYWORDS: &[&str] = &["INSERT", "UPDATE", "DELETE", "CREATE", "DROP", "ALTER"];

/// Kind of statement a caller intends to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementCategory {
    Read,
    Insert,
    Update,
    Delete,
    Schema,
}

impl StatementCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Schema => "schema",
        }
    }

    fn allowed_keywords(self) -> &'static [&'static str] {
        match self {
            Self::Read => &[],
            Self::Insert => &["INSERT"],
            Self::Update => &["UPDATE"],
            Self::Delete => &["DELETE"],
            Self::Schema => &["CREATE", "DROP", "ALTER"],
        }
    }

    /// Rejects `sql` when it contains a keyword this category forbids.
    ///
    /// # Errors
    /// - `DbError::InvalidStatement` naming the first offending token.
    pub fn check(self, sql: &str) -> DbResult<()> {
        let allowed = self.allowed_keywords();
        let offending = sql
            .split_whitespace()
            .map(str::to_ascii_uppercase)
            .find(|token| {
                OPERATION_KEYWORDS.contains(&token.as_str()) && !allowed.contains(&token.as_str())
            });

        match offending {
            Some(token) => Err(DbError::InvalidStatement {
                category: self,
                token,
            }),
            None => Ok(()),
        }
    }
}

/// Runs category-checked statements on a borrowed connection.
///
/// Works on a plain `Connection` or on an open `Transaction` through deref.
#[derive(Clone, Copy)]
pub struct SqlExecutor<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlExecutor<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Runs a read statement and maps every row.
    pub fn query_rows<T, P, F, E>(&self, sql: &str, params: P, mut map: F) -> Result<Vec<T>, E>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> Result<T, E>,
        E: From<DbError>,
    {
        StatementCategory::Read.check(sql)?;
        let mut stmt = self.conn.prepare(sql).map_err(DbError::from)?;
        let mut rows = stmt.query(params).map_err(DbError::from)?;
        let mut items = Vec::new();
        while let Some(row) = rows.next().map_err(DbError::from)? {
            items.push(map(row)?);
        }
        Ok(items)
    }

    /// Runs a read statement and maps the first row, if any.
    pub fn query_first<T, P, F, E>(&self, sql: &str, params: P, map: F) -> Result<Option<T>, E>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> Result<T, E>,
        E: From<DbError>,
    {
        StatementCategory::Read.check(sql)?;
        let mut stmt = self.conn.prepare(sql).map_err(DbError::from)?;
        let mut rows = stmt.query(params).map_err(DbError::from)?;
        match rows.next().map_err(DbError::from)? {
            Some(row) => Ok(Some(map(row)?)),
            None => Ok(None),
        }
    }

    /// Returns whether at least one row was inserted.
    pub fn insert<P: Params>(&self, sql: &str, params: P) -> DbResult<bool> {
        self.write(StatementCategory::Insert, sql, params)
    }

    /// Returns whether at least one row was updated.
    pub fn update<P: Params>(&self, sql: &str, params: P) -> DbResult<bool> {
        self.write(StatementCategory::Update, sql, params)
    }

    /// Returns whether at least one row was deleted.
    pub fn delete<P: Params>(&self, sql: &str, params: P) -> DbResult<bool> {
        self.write(StatementCategory::Delete, sql, params)
    }

    /// Runs a batch of schema statements and returns the affected-row count
    /// reported by SQLite for the last statement.
    pub fn execute_schema(&self, sql: &str) -> DbResult<usize> {
        StatementCategory::Schema.check(sql)?;
        self.conn.execute_batch(sql)?;
        Ok(usize::try_from(self.conn.changes()).unwrap_or(usize::MAX))
    }

    fn write<P: Params>(&self, category: StatementCategory, sql: &str, params: P) -> DbResult<bool> {
        category.check(sql)?;
        let changed = self.conn.execute(sql, params)?;
        debug!(
            "event=sql_write module=db category={} rows={}",
            category.as_str(),
            changed
        );
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::{SqlExecutor, StatementCategory};
    use crate::db::DbError;
    use rusqlite::Connection;

    #[test]
    fn read_rejects_delete_token_anywhere() {
        let err = StatementCategory::Read
            .check("SELECT * FROM person WHERE name = ' delete '")
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::InvalidStatement { category: StatementCategory::Read, ref token } if token == "DELETE"
        ));
    }

    #[test]
    fn tokens_are_whitespace_delimited() {
        StatementCategory::Read
            .check("SELECT updated_at, created FROM person")
            .unwrap();
        StatementCategory::Read
            .check("SELECT id\n FROM person\tWHERE id = ?1")
            .unwrap();
        assert!(StatementCategory::Read
            .check("SELECT id FROM person;\nDROP\tTABLE person")
            .is_err());
    }

    #[test]
    fn each_write_category_allows_only_its_keyword() {
        StatementCategory::Insert
            .check("INSERT INTO person (id) SELECT 1")
            .unwrap();
        assert!(StatementCategory::Insert
            .check("INSERT INTO person (id) VALUES (1); DELETE FROM person")
            .is_err());
        StatementCategory::Update
            .check("update person set name = 'x'")
            .unwrap();
        assert!(StatementCategory::Update
            .check("UPDATE person SET name = 'x'; INSERT INTO person (id) VALUES (2)")
            .is_err());
        StatementCategory::Delete
            .check("DELETE FROM person WHERE id = 1")
            .unwrap();
        StatementCategory::Schema
            .check("CREATE TABLE t (id INTEGER); DROP TABLE t")
            .unwrap();
        assert!(StatementCategory::Schema
            .check("CREATE TABLE t (id INTEGER); INSERT INTO t VALUES (1)")
            .is_err());
    }

    #[test]
    fn rejected_statement_never_runs() {
        let conn = Connection::open_in_memory().unwrap();
        let exec = SqlExecutor::new(&conn);
        exec.execute_schema("CREATE TABLE t (id INTEGER NOT NULL);")
            .unwrap();
        exec.insert("INSERT INTO t (id) VALUES (1)", []).unwrap();

        let err = exec
            .update("UPDATE t SET id = 2 ; DELETE FROM t", [])
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidStatement { .. }));

        let ids: Vec<i64> = exec
            .query_rows("SELECT id FROM t", [], |row| {
                row.get::<_, i64>(0).map_err(DbError::from)
            })
            .unwrap();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn write_reports_whether_rows_changed() {
        let conn = Connection::open_in_memory().unwrap();
        let exec = SqlExecutor::new(&conn);
        exec.execute_schema("CREATE TABLE t (id INTEGER NOT NULL);")
            .unwrap();
        assert!(exec.insert("INSERT INTO t (id) VALUES (?1)", [7]).unwrap());
        assert!(!exec.delete("DELETE FROM t WHERE id = ?1", [8]).unwrap());
        assert!(exec.delete("DELETE FROM t WHERE id = ?1", [7]).unwrap());
        let first: Option<i64> = exec
            .query_first("SELECT id FROM t", [], |row| {
                row.get::<_, i64>(0).map_err(DbError::from)
            })
            .unwrap();
        assert!(first.is_none());
    }
}
