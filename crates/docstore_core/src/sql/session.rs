//! Scoped sessions and transactions that execute `TableQuery` values.

use super::{Row, SqlError, SqlResult, TableQuery};
use crate::db::{Database, SessionConnection};
use log::trace;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Transaction};
use std::collections::BTreeMap;

/// Statement execution shared by sessions and transactions.
pub trait TableOperations {
    /// Connection the statements run on.
    fn connection(&self) -> &Connection;

    /// Reads exactly one row.
    ///
    /// # Errors
    /// - `SqlError::NotFound` when no row matches.
    /// - `SqlError::DataError` when more than one row matches.
    fn read_one_row(&self, query: &TableQuery) -> SqlResult<Row> {
        let mut rows = self.read_rows(query)?;
        match rows.len() {
            1 => Ok(rows.remove(0)),
            0 => Err(SqlError::NotFound(format!(
                "no row in `{}` matched the query",
                query.table()
            ))),
            found => Err(SqlError::DataError(format!(
                "expected one row in `{}`, found {found}",
                query.table()
            ))),
        }
    }

    fn read_rows(&self, query: &TableQuery) -> SqlResult<Vec<Row>> {
        let (sql, binds) = query.select_sql();
        trace!("event=sql_read module=sql table={}", query.table());
        let mut stmt = self.connection().prepare(&sql)?;
        let columns = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>();
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = BTreeMap::new();
            for (index, column) in columns.iter().enumerate() {
                values.insert(column.clone(), row.get::<_, Value>(index)?);
            }
            result.push(Row::new(values));
        }
        Ok(result)
    }

    /// Counts matching rows; ignores ordering and row range.
    fn read_number_of_rows(&self, query: &TableQuery) -> SqlResult<u64> {
        let (sql, binds) = query.count_sql();
        trace!("event=sql_count module=sql table={}", query.table());
        let count: i64 =
            self.connection()
                .query_row(&sql, params_from_iter(binds), |row| row.get(0))?;
        u64::try_from(count)
            .map_err(|_| SqlError::DataError(format!("negative row count {count}")))
    }

    fn insert_row(&self, query: &TableQuery) -> SqlResult<()> {
        if !query.has_parameters() {
            return Err(SqlError::DataError(format!(
                "insert into `{}` without parameters",
                query.table()
            )));
        }
        let (sql, binds) = query.insert_sql();
        trace!("event=sql_insert module=sql table={}", query.table());
        self.connection().execute(&sql, params_from_iter(binds))?;
        Ok(())
    }

    /// Returns the number of updated rows.
    fn update_rows(&self, query: &TableQuery) -> SqlResult<usize> {
        if !query.has_parameters() {
            return Err(SqlError::DataError(format!(
                "update of `{}` without parameters",
                query.table()
            )));
        }
        let (sql, binds) = query.update_sql();
        trace!("event=sql_update module=sql table={}", query.table());
        Ok(self.connection().execute(&sql, params_from_iter(binds))?)
    }

    /// Returns the number of deleted rows.
    fn delete_rows(&self, query: &TableQuery) -> SqlResult<usize> {
        let (sql, binds) = query.delete_sql();
        trace!("event=sql_delete module=sql table={}", query.table());
        Ok(self.connection().execute(&sql, params_from_iter(binds))?)
    }
}

/// Connection scope for one storage operation.
pub struct TableSession<'db> {
    conn: SessionConnection<'db>,
}

impl<'db> TableSession<'db> {
    /// Acquires a connection from `database`.
    pub fn open(database: &'db Database) -> SqlResult<Self> {
        let conn = database.connect()?;
        Ok(Self { conn })
    }

    /// Starts a transaction; it rolls back when dropped uncommitted.
    pub fn transaction(&mut self) -> SqlResult<TableTransaction<'_>> {
        let tx = self.conn.transaction()?;
        Ok(TableTransaction { tx })
    }
}

impl TableOperations for TableSession<'_> {
    fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Transaction bound to a `TableSession`.
pub struct TableTransaction<'session> {
    tx: Transaction<'session>,
}

impl TableTransaction<'_> {
    pub fn commit(self) -> SqlResult<()> {
        self.tx.commit()?;
        Ok(())
    }
}

impl TableOperations for TableTransaction<'_> {
    fn connection(&self) -> &Connection {
        &self.tx
    }
}

impl Database {
    /// Opens a table session on this database.
    pub fn session(&self) -> SqlResult<TableSession<'_>> {
        TableSession::open(self)
    }
}

#[cfg(test)]
mod tests {
    use super::TableOperations;
    use crate::db::Database;
    use crate::sql::TableQuery;
    use rusqlite::Connection;
    use std::time::Duration;

    fn insert_record(conn: &Connection, id: &str) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO record (type, id, datadivider, data) VALUES ('person', ?1, 'd', '{}')",
            [id],
        )
    }

    #[test]
    fn reads_in_one_transaction_see_one_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.sqlite3");
        let database = Database::open(&path).unwrap();
        let writer = Connection::open(&path).unwrap();
        writer.busy_timeout(Duration::ZERO).unwrap();
        insert_record(&writer, "1").unwrap();
        insert_record(&writer, "2").unwrap();

        let mut session = database.session().unwrap();
        let tx = session.transaction().unwrap();
        let query = TableQuery::new("record");
        let rows = tx.read_rows(&query).unwrap();

        assert!(insert_record(&writer, "3").is_err());
        assert_eq!(tx.read_number_of_rows(&query).unwrap(), rows.len() as u64);
        drop(tx);
        drop(session);

        insert_record(&writer, "3").unwrap();
        assert_eq!(
            database
                .session()
                .unwrap()
                .read_number_of_rows(&query)
                .unwrap(),
            3
        );
    }
}
