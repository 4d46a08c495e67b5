use crate::api::ClientError;
use crate::util::now_millis;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Upper bound on `rows * columns` for a single store
pub const MAX_BATCH_SIZE: usize = 500;

/// Column names the backend reserves for itself (compared case-insensitively)
pub const RESERVED_COLUMNS: [&str; 3] = ["time", "time_offset", "all"];

/// One timestamped row. Every declared column has an entry; omitted ones hold `Value::Null`.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    pub time: i64,
    pub values: HashMap<String, Value>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }
}

/// The `DataStore` is a column oriented buffer of timestamped rows waiting to be sent.
///
/// Columns are fixed at construction. Rows are appended with [`DataStore::add`] or
/// [`DataStore::add_now`] until the store holds `MAX_BATCH_SIZE` values, and are cleared with
/// [`DataStore::reset`]. A store is shared between the caller and the client sending it, so
/// all mutation goes through `&self`.
///
/// Timestamps are taken as given: negative, repeated and out of order times are all accepted.
#[derive(Debug)]
pub struct DataStore {
    columns: Vec<String>,
    rows: Mutex<Vec<Row>>,
}

impl DataStore {
    /// Creates an empty store with the given columns.
    ///
    /// Fails if a column is empty, repeats another column, or (ignoring case) is one of
    /// `time`, `time_offset` or `all`.
    pub fn new<I, S>(columns: I) -> Result<DataStore, ClientError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let mut lower: Vec<String> = Vec::with_capacity(columns.len());
        for column in &columns {
            if column.is_empty() {
                return Err(ClientError::validation("Column name cannot be empty"));
            }
            let name = column.to_lowercase();
            if lower.contains(&name) {
                return Err(ClientError::validation(format!(
                    "Column '{}' is declared more than once",
                    column
                )));
            }
            lower.push(name);
        }
        for reserved in RESERVED_COLUMNS {
            if lower.iter().any(|c| c == reserved) {
                return Err(ClientError::validation(format!(
                    "'{}' is a reserved column name",
                    reserved
                )));
            }
        }

        Ok(DataStore::from_parts(columns, vec![]))
    }

    fn from_parts(columns: Vec<String>, rows: Vec<Row>) -> DataStore {
        DataStore {
            columns,
            rows: Mutex::new(rows),
        }
    }

    fn lock_rows(&self) -> MutexGuard<'_, Vec<Row>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a row at `time`. Keys of `data` must be declared columns; declared columns
    /// missing from `data` are stored as null. On error the store is left untouched.
    pub fn add<I, K, V>(&self, time: i64, data: I) -> Result<(), ClientError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut data: HashMap<String, Value> = data
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        if let Some(unknown) = data.keys().find(|k| !self.columns.contains(*k)) {
            return Err(ClientError::validation(format!(
                "data contains field not in this store: {}",
                unknown
            )));
        }

        let mut rows = self.lock_rows();
        if (rows.len() + 1) * self.columns.len() > MAX_BATCH_SIZE {
            return Err(ClientError::validation(format!(
                "stores are limited to {} data points",
                MAX_BATCH_SIZE
            )));
        }

        let values = self
            .columns
            .iter()
            .map(|c| (c.clone(), data.remove(c).unwrap_or(Value::Null)))
            .collect();
        rows.push(Row { time, values });
        Ok(())
    }

    /// Appends a row stamped with the current wall clock time in milliseconds
    pub fn add_now<I, K, V>(&self, data: I) -> Result<(), ClientError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.add(now_millis(), data)
    }

    pub fn fields(&self) -> Vec<String> {
        self.columns.clone()
    }

    pub fn rows(&self) -> Vec<Row> {
        self.lock_rows().clone()
    }

    /// Number of values held, i.e. `columns * rows`
    pub fn size(&self) -> usize {
        self.columns.len() * self.lock_rows().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_rows().is_empty()
    }

    pub fn reset(&self) {
        self.lock_rows().clear();
    }

    /// Returns an independent store holding the current columns and rows
    pub fn snapshot(&self) -> DataStore {
        DataStore::from_parts(self.columns.clone(), self.rows())
    }

    /// Snapshot and reset in one step, so rows added concurrently are neither lost nor sent twice
    pub(crate) fn detach(&self) -> DataStore {
        let rows = std::mem::take(&mut *self.lock_rows());
        DataStore::from_parts(self.columns.clone(), rows)
    }

    /// Table form sent to the imports endpoint: `{"fields": ["time", ...], "data": [[...], ...]}`
    pub fn to_payload(&self) -> Value {
        let mut fields = Vec::with_capacity(self.columns.len() + 1);
        fields.push("time".to_string());
        fields.extend(self.columns.iter().cloned());

        let data: Vec<Value> = self
            .lock_rows()
            .iter()
            .map(|row| {
                let mut line = Vec::with_capacity(fields.len());
                line.push(Value::from(row.time));
                for column in &self.columns {
                    line.push(row.get(column).cloned().unwrap_or(Value::Null));
                }
                Value::Array(line)
            })
            .collect();

        json!({ "fields": fields, "data": data })
    }
}

impl Clone for DataStore {
    fn clone(&self) -> DataStore {
        self.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELDS: [&str; 3] = ["foo", "bar", "baz"];

    fn full_row(i: i64) -> [(&'static str, Value); 3] {
        [("foo", i.into()), ("bar", i.into()), ("baz", i.into())]
    }

    #[test]
    fn constructor_rejects_bad_columns() {
        let bad: Vec<Vec<&str>> = vec![
            vec!["col1", "time", "col2"],
            vec!["TimE", "col1"],
            vec!["col1", "time_offset", "col2"],
            vec!["Time_OffseT", "col2"],
            vec!["col1", "all", "col2"],
            vec!["ALL", "none"],
            vec!["col1", ""],
            vec!["a", "A"],
        ];
        for columns in bad {
            let err = DataStore::new(columns.clone()).unwrap_err();
            assert!(err.is_validation(), "{:?} should fail", columns);
        }
    }

    #[test]
    fn fields_are_a_copy() {
        let mut temp = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let store = DataStore::new(temp.clone()).unwrap();
        temp.push("d".to_string());
        assert_eq!(store.fields(), vec!["a", "b", "c"]);

        let mut have = store.fields();
        have.clear();
        assert_eq!(store.fields().len(), 3);
    }

    #[test]
    fn full_and_sparse_rows() {
        let store = DataStore::new(FIELDS).unwrap();
        store
            .add(0, [("foo", 1.0), ("bar", 2.0), ("baz", 3.0)])
            .unwrap();
        store.add(1000, [("foo", 1.0), ("baz", 3.0)]).unwrap();
        store.add(2000, Vec::<(&str, Value)>::new()).unwrap();

        let rows = store.rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].time, 0);
        assert_eq!(rows[0].get("bar"), Some(&Value::from(2.0)));
        assert_eq!(rows[1].time, 1000);
        assert_eq!(rows[1].get("bar"), Some(&Value::Null));
        assert_eq!(rows[1].get("baz"), Some(&Value::from(3.0)));
        assert!(rows[2].values.values().all(Value::is_null));
        assert_eq!(rows[2].values.len(), 3);
    }

    #[test]
    fn falsy_values_are_kept() {
        let store = DataStore::new(["count", "ok"]).unwrap();
        store
            .add(5, [("count", Value::from(0)), ("ok", Value::from(false))])
            .unwrap();
        let row = &store.rows()[0];
        assert_eq!(row.get("count"), Some(&Value::from(0)));
        assert_eq!(row.get("ok"), Some(&Value::from(false)));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let store = DataStore::new(FIELDS).unwrap();
        assert!(store.add(0, [("wrong", 5.0)]).is_err());
        assert!(store
            .add(0, [("foo", 1.0), ("bar", 2.0), ("baz", 3.0), ("bad", 5.0)])
            .is_err());
        assert!(store.add(0, [("FOO", 1.0)]).is_err());
        assert_eq!(store.rows().len(), 0);
    }

    #[test]
    fn duplicate_and_negative_times() {
        let store = DataStore::new(["v"]).unwrap();
        store.add(-5, [("v", 1)]).unwrap();
        store.add(-5, [("v", 2)]).unwrap();
        store.add(i64::MAX, [("v", 3)]).unwrap();
        let times: Vec<i64> = store.rows().iter().map(|r| r.time).collect();
        assert_eq!(times, vec![-5, -5, i64::MAX]);
    }

    #[test]
    fn add_now_uses_wall_clock() {
        let store = DataStore::new(FIELDS).unwrap();
        let before = now_millis();
        store.add_now(full_row(1)).unwrap();
        let after = now_millis();
        let time = store.rows()[0].time;
        assert!(before <= time && time <= after);
    }

    #[test]
    fn capacity_guard() {
        let store = DataStore::new(FIELDS).unwrap();
        for i in 0..166 {
            store.add(i, full_row(i)).unwrap();
            assert_eq!(store.size(), (i as usize + 1) * 3);
        }
        let err = store.add(167, [("foo", 167)]).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(store.size(), 498);
        assert_eq!(store.rows().len(), 166);
    }

    #[test]
    fn capacity_exactly_full() {
        let store = DataStore::new(["a", "b", "c", "d", "e"]).unwrap();
        for i in 0..100 {
            store.add(i, [("a", i)]).unwrap();
        }
        assert_eq!(store.size(), 500);
        assert!(store.add(100, [("a", 100)]).is_err());
        assert_eq!(store.size(), 500);
    }

    #[test]
    fn reset_keeps_fields() {
        let store = DataStore::new(FIELDS).unwrap();
        for i in 0..100 {
            store.add(i, full_row(i)).unwrap();
        }
        store.reset();
        assert_eq!(store.size(), 0);
        assert!(store.rows().is_empty());
        assert_eq!(store.fields(), FIELDS);

        store.add(0, full_row(0)).unwrap();
        assert_eq!(store.rows().len(), 1);
    }

    #[test]
    fn snapshot_is_independent() {
        let store = DataStore::new(FIELDS).unwrap();
        for i in 0..5 {
            store.add(i, full_row(i)).unwrap();
        }

        let snap = store.snapshot();
        assert_eq!(snap.size(), store.size());
        assert_eq!(snap.fields(), store.fields());
        assert_eq!(snap.rows(), store.rows());

        store.add(6, [("foo", 6)]).unwrap();
        assert_eq!(snap.size(), store.size() - 3);
        assert_eq!(snap.rows().len(), store.rows().len() - 1);

        store.reset();
        assert_eq!(snap.rows().len(), 5);
    }

    #[test]
    fn rows_are_a_copy() {
        let store = DataStore::new(FIELDS).unwrap();
        store.add(1, full_row(1)).unwrap();
        let mut rows = store.rows();
        rows[0].time = 99;
        rows[0].values.insert("foo".to_string(), Value::from("changed"));
        assert_eq!(store.rows()[0].time, 1);
        assert_eq!(store.rows()[0].get("foo"), Some(&Value::from(1)));
    }

    #[test]
    fn detach_moves_rows() {
        let store = DataStore::new(FIELDS).unwrap();
        store.add(1, full_row(1)).unwrap();
        store.add(2, full_row(2)).unwrap();

        let detached = store.detach();
        assert_eq!(detached.rows().len(), 2);
        assert!(store.is_empty());
        assert_eq!(store.fields(), detached.fields());
    }

    #[test]
    fn payload_shape() {
        let store = DataStore::new(["temperature", "humidity"]).unwrap();
        store.add(10, [("humidity", 40)]).unwrap();
        store
            .add(20, [("temperature", 72.0), ("humidity", 41.0)])
            .unwrap();

        assert_eq!(
            store.to_payload(),
            json!({
                "fields": ["time", "temperature", "humidity"],
                "data": [[10, null, 40], [20, 72.0, 41.0]]
            })
        );
    }
}
