//! Batched event store writer (spec §4.6): events buffer in memory and are
//! flushed in a single transaction either on a timer or on demand.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rusqlite::params;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::interval;

use crate::error::{Error, Result};

const FLUSH_PERIOD: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct StoredEvent {
    pub ts: i64,
    pub source: String,
    pub category: String,
    pub method: String,
    pub data: Value,
    pub session_id: Option<String>,
}

pub struct EventStore {
    conn: tokio_rusqlite::Connection,
    buffer: Arc<Mutex<Vec<StoredEvent>>>,
}

impl EventStore {
    pub async fn open(path: &str) -> Result<Self> {
        let conn = tokio_rusqlite::Connection::open(path).await?;
        conn.call(|conn| Ok(super::schema::init_schema(&*conn)?)).await?;

        let store = Self {
            conn,
            buffer: Arc::new(Mutex::new(Vec::new())),
        };
        store.spawn_flush_timer();
        Ok(store)
    }

    pub async fn open_in_memory() -> Result<Self> {
        let conn = tokio_rusqlite::Connection::open_in_memory().await?;
        conn.call(|conn| Ok(super::schema::init_schema(&*conn)?)).await?;
        Ok(Self {
            conn,
            buffer: Arc::new(Mutex::new(Vec::new())),
        })
    }

    fn spawn_flush_timer(&self) {
        let conn = self.conn.clone();
        let buffer = self.buffer.clone();
        tokio::spawn(async move {
            let mut ticker = interval(FLUSH_PERIOD);
            loop {
                ticker.tick().await;
                if let Err(e) = flush(&conn, &buffer).await {
                    tracing::debug!(error = %e, "periodic event store flush failed");
                }
            }
        });
    }

    /// Push `event` onto the pending buffer; `flush_now` forces a
    /// synchronous flush that returns only once the event is durably
    /// appended.
    pub async fn record(&self, event: StoredEvent, flush_now: bool) -> Result<()> {
        self.buffer.lock().await.push(event);
        if flush_now {
            flush(&self.conn, &self.buffer).await?;
        }
        Ok(())
    }

    /// Flush first, then run `sql` with `params` and return rows as
    /// dictionaries keyed by column name.
    pub async fn query(&self, sql: &str, params: Vec<Value>) -> Result<Vec<HashMap<String, Value>>> {
        flush(&self.conn, &self.buffer).await?;
        let sql = sql.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let column_names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
                let bound: Vec<rusqlite::types::Value> = params.into_iter().map(json_to_sql).collect();
                let rows = stmt.query_map(rusqlite::params_from_iter(bound), |row| {
                    let mut map = HashMap::new();
                    for (i, name) in column_names.iter().enumerate() {
                        map.insert(name.clone(), sql_to_json(row.get_ref(i)?));
                    }
                    Ok(map)
                })?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn close(&self) -> Result<()> {
        flush(&self.conn, &self.buffer).await
    }
}

async fn flush(conn: &tokio_rusqlite::Connection, buffer: &Arc<Mutex<Vec<StoredEvent>>>) -> Result<()> {
    let batch = {
        let mut buf = buffer.lock().await;
        std::mem::take(&mut *buf)
    };
    if batch.is_empty() {
        return Ok(());
    }

    let to_write = batch.clone();
    let result = conn
        .call(move |conn| {
            let tx = conn.transaction()?;
            for e in &to_write {
                let data = serde_json::to_string(&e.data).unwrap_or_default();
                tx.execute(
                    "INSERT INTO events (ts, source, category, method, data, session_id) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![e.ts, e.source, e.category, e.method, data, e.session_id],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await;

    if let Err(e) = result {
        // retry: prepend the failed batch back onto the pending buffer
        let mut buf = buffer.lock().await;
        let mut restored = batch;
        restored.append(&mut buf);
        *buf = restored;
        return Err(Error::from(e));
    }
    Ok(())
}

fn json_to_sql(v: Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as SqlValue;
    match v {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(b as i64),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else {
                SqlValue::Real(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => SqlValue::Text(s),
        other => SqlValue::Text(other.to_string()),
    }
}

fn sql_to_json(v: rusqlite::types::ValueRef) -> Value {
    use rusqlite::types::ValueRef;
    match v {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(method: &str) -> StoredEvent {
        StoredEvent {
            ts: 1,
            source: "cdp".into(),
            category: "debugger".into(),
            method: method.into(),
            data: serde_json::json!({"k": "v"}),
            session_id: Some("s0".into()),
        }
    }

    #[tokio::test]
    async fn record_with_flush_now_is_visible_immediately() {
        let store = EventStore::open_in_memory().await.unwrap();
        store.record(event("Debugger.paused"), true).await.unwrap();
        let rows = store.query("SELECT * FROM events", vec![]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["method"], Value::String("Debugger.paused".into()));
    }

    #[tokio::test]
    async fn query_flushes_pending_buffer_first() {
        let store = EventStore::open_in_memory().await.unwrap();
        store.record(event("Debugger.resumed"), false).await.unwrap();
        let rows = store.query("SELECT * FROM events", vec![]).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn close_flushes_remaining_events() {
        let store = EventStore::open_in_memory().await.unwrap();
        store.record(event("Runtime.consoleAPICalled"), false).await.unwrap();
        store.close().await.unwrap();
        let rows = store.query("SELECT * FROM events", vec![]).await.unwrap();
        assert_eq!(rows.len(), 1);
    }
}
