//! Real [`ObjectStore`]: a content-addressed IPFS node reached over its
//! HTTP API (`client.ipfsPath`, §6).

use async_trait::async_trait;
use serde::Deserialize;

use content_publisher::ObjectStore;
use shared_types::cid::Cid;
use shared_types::errors::PublishError;

pub struct IpfsObjectStore {
    http: reqwest::Client,
    api_base: String,
}

#[derive(Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

impl IpfsObjectStore {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for IpfsObjectStore {
    async fn put(&self, bytes: Vec<u8>) -> Result<Cid, PublishError> {
        let form = reqwest::multipart::Form::new().part("file", reqwest::multipart::Part::bytes(bytes));

        let response = self
            .http
            .post(format!("{}/api/v0/add", self.api_base))
            .multipart(form)
            .send()
            .await
            .map_err(|e| PublishError::PutFailed(e.to_string()))?
            .error_for_status()
            .map_err(|e| PublishError::PutFailed(e.to_string()))?
            .json::<AddResponse>()
            .await
            .map_err(|e| PublishError::PutFailed(e.to_string()))?;

        Ok(Cid::new(response.hash)?)
    }

    async fn get(&self, cid: &Cid) -> Result<Vec<u8>, PublishError> {
        let response = self
            .http
            .post(format!("{}/api/v0/cat?arg={}", self.api_base, cid.as_str()))
            .send()
            .await
            .map_err(|e| PublishError::GetFailed(e.to_string()))?
            .error_for_status()
            .map_err(|e| PublishError::GetFailed(e.to_string()))?;

        Ok(response.bytes().await.map_err(|e| PublishError::GetFailed(e.to_string()))?.to_vec())
    }
}
