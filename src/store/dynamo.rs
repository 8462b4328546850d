//! DynamoDB implementation of the store boundary.
//!
//! Scans use a server-side filter expression on the soft-delete attribute
//! and project only the key attribute, paging through the table via
//! `ExclusiveStartKey`/`LastEvaluatedKey`. Deletes go through
//! `BatchWriteItem`, surfacing the backend's `UnprocessedItems` so the
//! submitter can resubmit them.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_dynamodb::{
    Client,
    types::{AttributeValue, DeleteRequest, WriteRequest},
};

use super::{BatchDeleter, RowKey, ScanPage, StoreError, StoreResult, TableScanner};

/// Configuration for the target DynamoDB table.
#[derive(Debug, Clone)]
pub struct TableConfig {
    /// Table to sweep.
    pub table_name: String,
    /// Attribute holding the row key.
    pub key_attribute: String,
    /// Boolean attribute marking a record as soft-deleted.
    pub deleted_attribute: String,
    /// AWS region; `None` uses the ambient environment.
    pub region: Option<String>,
    /// Optional endpoint URL for testing with localstack.
    pub endpoint_url: Option<String>,
}

impl TableConfig {
    /// Create a config for the given table with the platform's default
    /// attribute names.
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            key_attribute: "id".to_string(),
            deleted_attribute: "deleted".to_string(),
            region: None,
            endpoint_url: None,
        }
    }

    pub fn with_key_attribute(mut self, attr: impl Into<String>) -> Self {
        self.key_attribute = attr.into();
        self
    }

    pub fn with_deleted_attribute(mut self, attr: impl Into<String>) -> Self {
        self.deleted_attribute = attr.into();
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set a custom endpoint URL (useful for localstack testing).
    pub fn with_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = Some(url.into());
        self
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self::new("panther-resources")
    }
}

/// DynamoDB-backed table handle implementing both store capabilities.
pub struct DynamoTable {
    client: Client,
    config: TableConfig,
}

impl DynamoTable {
    /// Build a client from the ambient AWS environment.
    ///
    /// The credential chain is resolved eagerly so that a missing chain is
    /// reported as [`StoreError::Credentials`] before any table call.
    pub async fn new(config: TableConfig) -> StoreResult<Self> {
        let mut aws_config = aws_config::from_env();

        if let Some(region) = &config.region {
            aws_config = aws_config.region(aws_config::Region::new(region.clone()));
        }

        let aws_config = aws_config.load().await;

        let provider = aws_config
            .credentials_provider()
            .ok_or_else(|| StoreError::Credentials("no credentials provider available".into()))?;
        provider
            .provide_credentials()
            .await
            .map_err(|e| StoreError::Credentials(e.to_string()))?;

        let mut ddb_config = aws_sdk_dynamodb::config::Builder::from(&aws_config);

        if let Some(endpoint_url) = &config.endpoint_url {
            ddb_config = ddb_config.endpoint_url(endpoint_url);
        }

        let client = Client::from_conf(ddb_config.build());

        Ok(Self { client, config })
    }

    fn delete_request(&self, key: &str) -> StoreResult<WriteRequest> {
        let request = DeleteRequest::builder()
            .key(&self.config.key_attribute, AttributeValue::S(key.to_string()))
            .build()
            .map_err(|e| StoreError::Backend(format!("invalid delete request: {e}")))?;
        Ok(WriteRequest::builder().delete_request(request).build())
    }
}

/// Pull the string row key out of a projected item.
fn key_of(item: &HashMap<String, AttributeValue>, key_attribute: &str) -> Option<RowKey> {
    item.get(key_attribute)
        .and_then(|value| value.as_s().ok())
        .cloned()
}

#[async_trait]
impl TableScanner for DynamoTable {
    type Token = HashMap<String, AttributeValue>;

    async fn scan_page(&self, start: Option<Self::Token>) -> StoreResult<ScanPage<Self::Token>> {
        let output = self
            .client
            .scan()
            .table_name(&self.config.table_name)
            .projection_expression("#key")
            .filter_expression("#deleted = :deleted")
            .expression_attribute_names("#key", &self.config.key_attribute)
            .expression_attribute_names("#deleted", &self.config.deleted_attribute)
            .expression_attribute_values(":deleted", AttributeValue::Bool(true))
            .set_exclusive_start_key(start)
            .send()
            .await
            .map_err(|err| {
                let service_error = err.into_service_error();
                if service_error.is_provisioned_throughput_exceeded_exception()
                    || service_error.is_request_limit_exceeded()
                {
                    StoreError::Throttled(service_error.to_string())
                } else {
                    StoreError::Backend(format!(
                        "scan of '{}' failed: {}",
                        self.config.table_name, service_error
                    ))
                }
            })?;

        let keys = output
            .items()
            .iter()
            .filter_map(|item| key_of(item, &self.config.key_attribute))
            .collect();
        let next = output.last_evaluated_key().cloned();

        Ok(ScanPage { keys, next })
    }
}

#[async_trait]
impl BatchDeleter for DynamoTable {
    async fn delete_batch(&self, keys: &[RowKey]) -> StoreResult<Vec<RowKey>> {
        let requests = keys
            .iter()
            .map(|key| self.delete_request(key))
            .collect::<StoreResult<Vec<_>>>()?;

        let output = self
            .client
            .batch_write_item()
            .request_items(&self.config.table_name, requests)
            .send()
            .await
            .map_err(|err| {
                let service_error = err.into_service_error();
                if service_error.is_provisioned_throughput_exceeded_exception()
                    || service_error.is_request_limit_exceeded()
                {
                    StoreError::Throttled(service_error.to_string())
                } else {
                    StoreError::Backend(format!(
                        "batch delete on '{}' failed: {}",
                        self.config.table_name, service_error
                    ))
                }
            })?;

        let unprocessed = output
            .unprocessed_items()
            .and_then(|items| items.get(&self.config.table_name))
            .map(|requests| {
                requests
                    .iter()
                    .filter_map(|request| request.delete_request())
                    .filter_map(|delete| key_of(delete.key(), &self.config.key_attribute))
                    .collect()
            })
            .unwrap_or_default();

        Ok(unprocessed)
    }
}
