use super::model::{ClientRecord, Supplemental};
use super::store::ClientStore;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use urlencoding::encode as urlencode;
use uuid::Uuid;

const DOC_TYPE: &str = "client";

/// Client records kept as one CouchDB document each
#[derive(Clone)]
pub struct CouchDbClientStore {
    client: Client,
    base_url: String,
    database: String,
    auth_header: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ClientDoc {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    rev: Option<String>,
    #[serde(rename = "type")]
    doc_type: String,
    client_id: Uuid,
    name: String,
    secret: String,
    #[serde(default)]
    scopes: Vec<String>,
    #[serde(default)]
    supplemental: Supplemental,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ClientDoc {
    fn from_record(record: ClientRecord, rev: Option<String>) -> Self {
        Self {
            id: doc_id(record.id),
            rev,
            doc_type: DOC_TYPE.to_string(),
            client_id: record.id,
            name: record.name,
            secret: record.secret,
            scopes: record.scopes,
            supplemental: record.supplemental,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    fn into_record(self) -> ClientRecord {
        ClientRecord {
            id: self.client_id,
            name: self.name,
            secret: self.secret,
            scopes: self.scopes,
            supplemental: self.supplemental,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

fn doc_id(id: Uuid) -> String {
    format!("client:{}", id)
}

impl CouchDbClientStore {
    pub fn new(url: &str, database: &str, username: &str, password: &str) -> Result<Self> {
        let auth = format!("{}:{}", username, password);
        let auth_header = format!("Basic {}", BASE64.encode(auth.as_bytes()));

        let base_url = url.trim_end_matches('/').to_string();

        Ok(Self {
            client: Client::new(),
            base_url,
            database: database.to_string(),
            auth_header,
        })
    }

    fn doc_url(&self, id: Uuid) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            self.database,
            urlencode(&doc_id(id))
        )
    }

    async fn get_doc(&self, id: Uuid) -> Result<Option<ClientDoc>> {
        let response = self
            .client
            .get(self.doc_url(id))
            .header("Authorization", &self.auth_header)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Failed to get client {}: {} - {}", id, status, body));
        }

        let doc: ClientDoc = response.json().await?;
        if doc.doc_type != DOC_TYPE {
            tracing::warn!("Document {} is not a client document, ignoring", doc.id);
            return Ok(None);
        }
        Ok(Some(doc))
    }

    async fn put_doc(&self, doc: &ClientDoc) -> Result<StatusCode> {
        let response = self
            .client
            .put(self.doc_url(doc.client_id))
            .header("Authorization", &self.auth_header)
            .header("Content-Type", "application/json")
            .json(doc)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() && status != StatusCode::CONFLICT {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Failed to save client {}: {} - {}",
                doc.client_id,
                status,
                body
            ));
        }
        Ok(status)
    }

    pub async fn test_connection(&self) -> Result<()> {
        let url = format!("{}/{}", self.base_url, self.database);

        let response = self
            .client
            .get(&url)
            .header("Authorization", &self.auth_header)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Failed to connect to CouchDB: {} - {}",
                status,
                body
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl ClientStore for CouchDbClientStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ClientRecord>> {
        Ok(self.get_doc(id).await?.map(ClientDoc::into_record))
    }

    async fn insert(&self, record: ClientRecord) -> Result<()> {
        let id = record.id;
        let doc = ClientDoc::from_record(record, None);
        // without a _rev couchdb answers 409 when the document already exists
        if self.put_doc(&doc).await? == StatusCode::CONFLICT {
            return Err(anyhow!("Client already exists: {}", id));
        }
        tracing::debug!("Inserted client document {}", doc.id);
        Ok(())
    }

    async fn update(&self, record: ClientRecord) -> Result<bool> {
        let id = record.id;
        let Some(existing) = self.get_doc(id).await? else {
            return Ok(false);
        };

        let doc = ClientDoc::from_record(record, existing.rev);
        if self.put_doc(&doc).await? == StatusCode::CONFLICT {
            return Err(anyhow!("Concurrent modification of client {}", id));
        }
        Ok(true)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let Some(existing) = self.get_doc(id).await? else {
            return Ok(false);
        };
        let Some(rev) = existing.rev else {
            return Ok(false);
        };

        let delete_url = format!("{}?rev={}", self.doc_url(id), urlencode(&rev));
        let response = self
            .client
            .delete(&delete_url)
            .header("Authorization", &self.auth_header)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Failed to delete client {}: {} - {}", id, status, body));
        }

        tracing::info!("Deleted client document {}", doc_id(id));
        Ok(true)
    }
}
