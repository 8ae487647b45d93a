use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{list_field, ServiceClient};
use crate::error::ServiceError;

pub const ENDPOINT: &str = "/api/pdks";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdkSpec {
    pub name: String,
    pub version: String,
    pub process: String,
    pub vendor: String,
    pub root_path: String,
    pub drc_path: String,
    pub lvs_path: String,
    pub xrc_path: String,
    pub spectre_path: String,
    pub hspice_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PdkUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drc_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lvs_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xrc_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spectre_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hspice_path: Option<String>,
}

pub struct PdkService {
    client: ServiceClient,
}

impl PdkService {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    pub fn create(&self, pdk: &PdkSpec) -> Result<Value, ServiceError> {
        self.client.post(ENDPOINT, pdk)
    }

    pub fn get(&self, id: &str) -> Result<Value, ServiceError> {
        self.client.get(&format!("{ENDPOINT}/{id}"))
    }

    pub fn list(&self) -> Result<Vec<Value>, ServiceError> {
        Ok(list_field(self.client.get(ENDPOINT)?, "pdks"))
    }

    pub fn update(&self, id: &str, update: &PdkUpdate) -> Result<Value, ServiceError> {
        self.client.put(&format!("{ENDPOINT}/{id}"), update)
    }

    pub fn delete(&self, id: &str) -> Result<Value, ServiceError> {
        self.client.delete(&format!("{ENDPOINT}/{id}"))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::service::test_server::respond_once;

    #[test]
    fn create_uses_path_field_names() {
        let (url, rx) = respond_once(200, r#"{"id":"p1"}"#);
        let pdk = PdkSpec {
            name: "gpdk045".to_string(),
            root_path: "/pdk/gpdk045".to_string(),
            spectre_path: "/pdk/gpdk045/models/spectre".to_string(),
            ..Default::default()
        };
        PdkService::new(ServiceClient::new(&url, None).unwrap())
            .create(&pdk)
            .unwrap();

        let body = rx.recv().unwrap().json();
        assert_eq!(body["rootPath"], "/pdk/gpdk045");
        assert_eq!(body["spectrePath"], "/pdk/gpdk045/models/spectre");
        assert_eq!(body["hspicePath"], "");
        assert_eq!(body.as_object().unwrap().len(), 10);
    }

    #[test]
    fn list_reads_pdks_array() {
        let (url, rx) = respond_once(200, r#"{"pdks":[{"id":"p1"}]}"#);
        let pdks = PdkService::new(ServiceClient::new(&url, None).unwrap())
            .list()
            .unwrap();
        assert_eq!(pdks, vec![json!({"id": "p1"})]);
        assert_eq!(rx.recv().unwrap().path, "/api/pdks");
    }
}
