//! Virtual tables (spec §4.8): state-derived, protocol-request, and
//! event-store-derived row sources, registered by name.

pub mod event_store;
pub mod protocol_request;
pub mod state_derived;

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::query::parser::Expr;
use crate::session::Session;
use crate::store::EventStore;

pub struct TableData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl TableData {
    pub fn new(columns: Vec<&str>) -> Self {
        Self {
            columns: columns.into_iter().map(String::from).collect(),
            rows: Vec::new(),
        }
    }
}

#[async_trait]
pub trait VirtualTable: Send + Sync {
    fn name(&self) -> &'static str;

    /// Columns that must appear as a top-level or subordinate `=`/`LIKE`
    /// comparison in the query's WHERE clause.
    fn required_filters(&self) -> &'static [&'static str] {
        &[]
    }

    async fn fetch(&self, session: &Session, filter: Option<&Expr>) -> Result<TableData>;
}

/// Name -> table lookup. Event-store-derived tables need the store handle;
/// everything else only needs the session.
pub struct TableRegistry {
    tables: HashMap<&'static str, Box<dyn VirtualTable>>,
}

impl TableRegistry {
    pub fn new(store: std::sync::Arc<EventStore>) -> Self {
        let mut tables: HashMap<&'static str, Box<dyn VirtualTable>> = HashMap::new();

        let mut register = |table: Box<dyn VirtualTable>| {
            tables.insert(table.name(), table);
        };

        register(Box::new(state_derived::FramesTable));
        register(Box::new(state_derived::ScopesTable));
        register(Box::new(state_derived::VarsTable));
        register(Box::new(state_derived::ThisTable));
        register(Box::new(state_derived::BreakpointsTable));
        register(Box::new(state_derived::ScriptsTable));
        register(Box::new(state_derived::ConsoleTable));
        register(Box::new(state_derived::ExceptionsTable));
        register(Box::new(state_derived::AsyncFramesTable));
        register(Box::new(state_derived::ThreadsTable));

        register(Box::new(protocol_request::PropsTable));
        register(Box::new(protocol_request::ProtoTable));
        register(Box::new(protocol_request::SourceTable));
        register(Box::new(protocol_request::ListenersTable));
        register(Box::new(protocol_request::DomTable));
        register(Box::new(protocol_request::StylesTable));
        register(Box::new(protocol_request::CookiesTable));
        register(Box::new(protocol_request::PerformanceTable));
        register(Box::new(protocol_request::StorageTable));
        register(Box::new(protocol_request::NetworkBodyTable));
        register(Box::new(protocol_request::NetworkHeadersTable));

        register(Box::new(event_store::EventsTable::new(store.clone())));
        register(Box::new(event_store::CdpTable::new(store.clone(), "cdp")));
        register(Box::new(event_store::CdpTable::new(store.clone(), "cdp_messages")));
        register(Box::new(event_store::ConnectionsTable::new(store.clone())));
        register(Box::new(event_store::TimelineTable::new(store)));

        Self { tables }
    }

    pub fn get(&self, name: &str) -> Option<&dyn VirtualTable> {
        self.tables.get(name).map(|b| b.as_ref())
    }
}
