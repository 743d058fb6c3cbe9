//! # Parameter store access and the process-wide table handle.

use std::{collections::HashMap, fmt, future::Future};

use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_ssm::Client as SsmClient;
use lazy_static::lazy_static;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

use crate::{config, config::ParameterKeys, errors::Error, utils::setup_sdk_config};

/// What the store handed back for one batch lookup.
#[derive(Default)]
pub struct ParameterReply {
    pub parameters: HashMap<String, String>,
    /// Names the store did not recognise.
    pub invalid: Vec<String>,
}

/// Read-only key-value secret store.
pub trait ParameterStore {
    /// Fetches every name in one call, decrypting secure strings.
    fn get_parameters(
        &self,
        names: &[String],
    ) -> impl Future<Output = Result<ParameterReply, Error>> + Send;
}

pub struct SsmParameterStore {
    client: SsmClient,
}

impl SsmParameterStore {
    pub fn new(client: SsmClient) -> Self {
        SsmParameterStore { client }
    }
}

impl ParameterStore for SsmParameterStore {
    async fn get_parameters(&self, names: &[String]) -> Result<ParameterReply, Error> {
        let output = self
            .client
            .get_parameters()
            .set_names(Some(names.to_vec()))
            .with_decryption(true)
            .send()
            .await?;

        let parameters = output
            .parameters()
            .iter()
            .filter_map(|p| Some((p.name()?.to_owned(), p.value()?.to_owned())))
            .collect();

        Ok(ParameterReply {
            parameters,
            invalid: output.invalid_parameters().to_vec(),
        })
    }
}

/// Decrypted values keyed by full parameter name.
pub struct ParameterSet {
    values: HashMap<String, String>,
}

impl ParameterSet {
    pub fn get(&self, name: &str) -> Result<&str, Error> {
        self.values
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| Error::config(format!("Parameter {} missing from store reply", name)))
    }
}

impl fmt::Debug for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut names: Vec<&String> = self.values.keys().collect();
        names.sort();
        f.debug_struct("ParameterSet")
            .field("names", &names)
            .field("values", &"<redacted>")
            .finish()
    }
}

/// Looks up both webhook parameters, failing if the store rejects any name.
#[instrument(skip(store))]
pub async fn fetch_parameters<S: ParameterStore + Sync>(
    store: &S,
    keys: &ParameterKeys,
) -> Result<ParameterSet, Error> {
    let reply = store.get_parameters(&keys.names()).await?;
    if !reply.invalid.is_empty() {
        return Err(Error::config(format!(
            "Invalid parameters: {:?}",
            reply.invalid
        )));
    }

    debug!(count = reply.parameters.len(), "parameters resolved");
    Ok(ParameterSet {
        values: reply.parameters,
    })
}

/// Long-lived DynamoDB table resource.
#[derive(Debug)]
pub struct TableHandle {
    client: DynamoDbClient,
    table_name: String,
}

impl TableHandle {
    pub fn new(client: DynamoDbClient, table_name: impl Into<String>) -> Self {
        TableHandle {
            client,
            table_name: table_name.into(),
        }
    }

    pub fn client(&self) -> &DynamoDbClient {
        &self.client
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

lazy_static! {
    static ref TABLE: OnceCell<TableHandle> = OnceCell::new();
}

/// Returns the process-wide table handle, building it on first use.
pub async fn table_handle() -> Result<&'static TableHandle, Error> {
    TABLE
        .get_or_try_init(|| async {
            let table_name = config::table_name_from_env()?;
            let sdk_config = setup_sdk_config().await;
            info!(table_name = %table_name, "table handle instantiated");
            Ok::<_, Error>(TableHandle::new(
                DynamoDbClient::new(&sdk_config),
                table_name,
            ))
        })
        .await
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// In-memory store answering from a fixed map.
    #[derive(Default)]
    pub struct StaticParameterStore {
        values: HashMap<String, String>,
        pub calls: AtomicUsize,
    }

    impl StaticParameterStore {
        pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
            self.values.insert(name.into(), value.into());
            self
        }
    }

    impl ParameterStore for StaticParameterStore {
        async fn get_parameters(&self, names: &[String]) -> Result<ParameterReply, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut reply = ParameterReply::default();
            for name in names {
                match self.values.get(name) {
                    Some(value) => {
                        reply.parameters.insert(name.clone(), value.clone());
                    }
                    None => reply.invalid.push(name.clone()),
                }
            }
            Ok(reply)
        }
    }
}
