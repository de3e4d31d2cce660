//! Query builders for PostgrestClient

use std::collections::HashMap;

use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::Error;
use crate::fetch::{Fetch, FetchBuilder};
use crate::postgrest::filter::FilterOperator;
use crate::postgrest::types::{SortOrder, PREFER_REPRESENTATION};

/// Where a request goes and who it runs as
#[derive(Debug, Clone)]
pub struct RequestTarget {
    pub(crate) url: String,
    pub(crate) key: String,
    pub(crate) client: Client,
    pub(crate) token: Option<String>,
    pub(crate) schema: Option<String>,
}

impl RequestTarget {
    fn decorate<'a>(&self, mut fetch: FetchBuilder<'a>, read: bool) -> FetchBuilder<'a> {
        fetch = fetch.header("apikey", &self.key);
        // anon key doubles as the bearer when no session token is set
        fetch = fetch.bearer_auth(self.token.as_deref().unwrap_or(&self.key));
        if let Some(schema) = &self.schema {
            let profile = if read { "Accept-Profile" } else { "Content-Profile" };
            fetch = fetch.header(profile, schema);
        }
        fetch
    }
}

/// Query parameter accumulator
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    params: HashMap<String, String>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter to the query, replacing any previous value
    pub fn add_param(&mut self, key: &str, value: &str) {
        self.params.insert(key.to_string(), value.to_string());
    }

    /// Add a column filter
    pub fn filter(&mut self, column: &str, op: FilterOperator, value: &str) {
        self.add_param(column, &op.apply(value));
    }

    pub fn get_params(&self) -> &HashMap<String, String> {
        &self.params
    }
}

/// Builder for SELECT queries
pub struct SelectBuilder {
    target: RequestTarget,
    query: QueryBuilder,
}

impl SelectBuilder {
    pub(crate) fn new(target: RequestTarget, columns: &str) -> Self {
        let mut query = QueryBuilder::new();
        query.add_param("select", columns);
        Self { target, query }
    }

    /// Filter rows where column equals a value
    pub fn eq<T: ToString>(mut self, column: &str, value: T) -> Self {
        self.query
            .filter(column, FilterOperator::Eq, &value.to_string());
        self
    }

    /// Filter rows where column matches a pattern (case insensitive)
    pub fn ilike(mut self, column: &str, pattern: &str) -> Self {
        self.query.filter(column, FilterOperator::ILike, pattern);
        self
    }

    /// Order the results by a column
    pub fn order(mut self, column: &str, order: SortOrder) -> Self {
        self.query
            .add_param("order", &format!("{}.{}", column, order.as_str()));
        self
    }

    /// Limit the number of rows returned
    pub fn limit(mut self, count: u32) -> Self {
        self.query.add_param("limit", &count.to_string());
        self
    }

    /// Execute the query and return the rows
    pub async fn execute<T: DeserializeOwned>(&self) -> Result<Vec<T>, Error> {
        let fetch = self
            .target
            .decorate(Fetch::get(&self.target.client, &self.target.url), true)
            .query(self.query.get_params());

        fetch.execute::<Vec<T>>().await
    }

    /// Execute the query and return the first row
    pub async fn execute_one<T: DeserializeOwned>(self) -> Result<Option<T>, Error> {
        let rows = self.limit(1).execute::<T>().await?;
        Ok(rows.into_iter().next())
    }
}

/// Builder for INSERT queries
pub struct InsertBuilder<T: Serialize> {
    target: RequestTarget,
    values: T,
}

impl<T: Serialize> InsertBuilder<T> {
    pub(crate) fn new(target: RequestTarget, values: T) -> Self {
        Self { target, values }
    }

    /// Execute the insert and return the inserted rows
    pub async fn execute<R: DeserializeOwned>(&self) -> Result<Vec<R>, Error> {
        let fetch = self
            .target
            .decorate(Fetch::post(&self.target.client, &self.target.url), false)
            .header("Prefer", PREFER_REPRESENTATION)
            .json(&self.values)?;

        fetch.execute::<Vec<R>>().await
    }
}

/// Builder for UPDATE queries
pub struct UpdateBuilder<T: Serialize> {
    target: RequestTarget,
    values: T,
    query: QueryBuilder,
}

impl<T: Serialize> UpdateBuilder<T> {
    pub(crate) fn new(target: RequestTarget, values: T) -> Self {
        Self {
            target,
            values,
            query: QueryBuilder::new(),
        }
    }

    /// Filter rows where column equals a value
    pub fn eq<V: ToString>(mut self, column: &str, value: V) -> Self {
        self.query
            .filter(column, FilterOperator::Eq, &value.to_string());
        self
    }

    /// Execute the update and return the updated rows
    pub async fn execute<R: DeserializeOwned>(&self) -> Result<Vec<R>, Error> {
        if self.query.get_params().is_empty() {
            return Err(Error::validation("refusing to update without a filter"));
        }

        let fetch = self
            .target
            .decorate(Fetch::patch(&self.target.client, &self.target.url), false)
            .header("Prefer", PREFER_REPRESENTATION)
            .query(self.query.get_params())
            .json(&self.values)?;

        fetch.execute::<Vec<R>>().await
    }
}

/// Builder for DELETE queries
pub struct DeleteBuilder {
    target: RequestTarget,
    query: QueryBuilder,
}

impl DeleteBuilder {
    pub(crate) fn new(target: RequestTarget) -> Self {
        Self {
            target,
            query: QueryBuilder::new(),
        }
    }

    /// Filter rows where column equals a value
    pub fn eq<V: ToString>(mut self, column: &str, value: V) -> Self {
        self.query
            .filter(column, FilterOperator::Eq, &value.to_string());
        self
    }

    /// Execute the delete and return the removed rows
    pub async fn execute<R: DeserializeOwned>(&self) -> Result<Vec<R>, Error> {
        if self.query.get_params().is_empty() {
            return Err(Error::validation("refusing to delete without a filter"));
        }

        let fetch = self
            .target
            .decorate(Fetch::delete(&self.target.client, &self.target.url), false)
            .header("Prefer", PREFER_REPRESENTATION)
            .query(self.query.get_params());

        fetch.execute::<Vec<R>>().await
    }
}
