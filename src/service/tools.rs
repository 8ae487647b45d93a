use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{list_field, ServiceClient};
use crate::error::ServiceError;

pub const ENDPOINT: &str = "/api/eda-tools";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSpec {
    pub name: String,
    pub version: String,
    pub launch_command: String,
    pub vendor: String,
    pub environment_variables: Vec<String>,
}

/// Partial update; only fields that are set are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launch_command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment_variables: Option<Vec<String>>,
}

pub struct EdaToolService {
    client: ServiceClient,
}

impl EdaToolService {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    pub fn create(&self, tool: &ToolSpec) -> Result<Value, ServiceError> {
        self.client.post(ENDPOINT, tool)
    }

    pub fn get(&self, id: &str) -> Result<Value, ServiceError> {
        self.client.get(&format!("{ENDPOINT}/{id}"))
    }

    pub fn list(&self) -> Result<Vec<Value>, ServiceError> {
        Ok(list_field(self.client.get(ENDPOINT)?, "tools"))
    }

    pub fn update(&self, id: &str, update: &ToolUpdate) -> Result<Value, ServiceError> {
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

    fn service(url: &str) -> EdaToolService {
        EdaToolService::new(ServiceClient::new(url, Some("k".to_string())).unwrap())
    }

    #[test]
    fn create_sends_camel_case_fields() {
        let (url, rx) = respond_once(201, r#"{"id":"t1"}"#);
        let tool = ToolSpec {
            name: "spectre".to_string(),
            version: "21.1".to_string(),
            launch_command: "ocean -nograph".to_string(),
            vendor: "cadence".to_string(),
            environment_variables: vec!["export CDS_ROOT=/opt".to_string()],
        };

        let created = service(&url).create(&tool).unwrap();
        assert_eq!(created["id"], "t1");

        let req = rx.recv().unwrap();
        assert_eq!(req.method, "POST");
        assert_eq!(req.path, "/api/eda-tools");
        assert_eq!(
            req.json(),
            json!({
                "name": "spectre",
                "version": "21.1",
                "launchCommand": "ocean -nograph",
                "vendor": "cadence",
                "environmentVariables": ["export CDS_ROOT=/opt"],
            })
        );
    }

    #[test]
    fn update_sends_only_given_fields() {
        let (url, rx) = respond_once(200, "{}");
        let update = ToolUpdate {
            version: Some("22.1".to_string()),
            ..Default::default()
        };
        service(&url).update("t1", &update).unwrap();

        let req = rx.recv().unwrap();
        assert_eq!(req.method, "PUT");
        assert_eq!(req.path, "/api/eda-tools/t1");
        assert_eq!(req.json(), json!({"version": "22.1"}));
    }

    #[test]
    fn list_reads_tools_array() {
        let (url, rx) = respond_once(200, r#"{"tools":[{"id":"a"},{"id":"b"}]}"#);
        let tools = service(&url).list().unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(rx.recv().unwrap().method, "GET");
    }

    #[test]
    fn delete_targets_tool() {
        let (url, rx) = respond_once(204, "");
        service(&url).delete("t9").unwrap();
        let req = rx.recv().unwrap();
        assert_eq!(req.method, "DELETE");
        assert_eq!(req.path, "/api/eda-tools/t9");
    }
}
