//! Database operations through the Postgrest gateway

mod filter;
mod query;
mod types;

use reqwest::Client;
use serde::Serialize;

pub use filter::*;
pub use query::*;
pub use types::*;

/// Client for one table or view
#[derive(Debug, Clone)]
pub struct PostgrestClient {
    target: RequestTarget,
    table: String,
}

impl PostgrestClient {
    /// Create a new PostgrestClient
    pub fn new(url: &str, key: &str, table: &str, client: Client) -> Self {
        let base = url.trim_end_matches('/');
        Self {
            target: RequestTarget {
                url: format!("{}/rest/v1/{}", base, table),
                key: key.to_string(),
                client,
                token: None,
                schema: None,
            },
            table: table.to_string(),
        }
    }

    /// Run requests as the holder of this access token
    pub fn with_auth(mut self, token: &str) -> Self {
        self.target.token = Some(token.to_string());
        self
    }

    /// Target a schema other than `public`
    pub fn with_schema(mut self, schema: &str) -> Self {
        self.target.schema = match schema {
            "" | "public" => None,
            s => Some(s.to_string()),
        };
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn url(&self) -> &str {
        &self.target.url
    }

    /// Select specific columns from the table
    pub fn select(&self, columns: &str) -> SelectBuilder {
        SelectBuilder::new(self.target.clone(), columns)
    }

    /// Insert data into the table
    pub fn insert<T: Serialize>(&self, values: T) -> InsertBuilder<T> {
        InsertBuilder::new(self.target.clone(), values)
    }

    /// Update data in the table
    pub fn update<T: Serialize>(&self, values: T) -> UpdateBuilder<T> {
        UpdateBuilder::new(self.target.clone(), values)
    }

    /// Delete data from the table
    pub fn delete(&self) -> DeleteBuilder {
        DeleteBuilder::new(self.target.clone())
    }
}
