use serde_json::{json, Value};

use super::{list_field, ServiceClient};
use crate::error::ServiceError;

pub const ENDPOINT: &str = "/api/projects";

pub struct ProjectService {
    client: ServiceClient,
}

impl ProjectService {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    fn endpoint(id: &str, section: &str) -> String {
        format!("{ENDPOINT}/{id}/{section}")
    }

    /// Creates a project. Without an `owner` the server records the caller.
    pub fn create(
        &self,
        name: &str,
        description: &str,
        owner: Option<&str>,
    ) -> Result<Value, ServiceError> {
        let mut body = json!({ "name": name, "description": description });
        if let Some(owner) = owner.filter(|o| !o.is_empty()) {
            body["owner"] = json!(owner);
        }
        self.client.post(ENDPOINT, &body)
    }

    /// `members` is a list of `{ userId, role }` objects.
    pub fn members(&self, id: &str, members: Value) -> Result<Value, ServiceError> {
        self.client
            .put(&Self::endpoint(id, "members"), &json!({ "members": members }))
    }

    pub fn directory(&self, id: &str, path: &str) -> Result<Value, ServiceError> {
        self.client.put(
            &Self::endpoint(id, "directory"),
            &json!({ "directoryPath": path }),
        )
    }

    pub fn pdk(&self, id: &str, path: &str) -> Result<Value, ServiceError> {
        self.client
            .put(&Self::endpoint(id, "pdk"), &json!({ "pdkPath": path }))
    }

    /// `libraries` is a list of `{ name, cells }` objects.
    pub fn libraries(&self, id: &str, libraries: Value) -> Result<Value, ServiceError> {
        self.client.put(
            &Self::endpoint(id, "libraries"),
            &json!({ "libraries": libraries }),
        )
    }

    pub fn eda_tools(&self, id: &str, config: &Value) -> Result<Value, ServiceError> {
        self.client.put(&Self::endpoint(id, "eda-tools"), config)
    }

    pub fn get(&self, id: &str) -> Result<Value, ServiceError> {
        self.client.get(&format!("{ENDPOINT}/{id}"))
    }

    pub fn list(&self) -> Result<Vec<Value>, ServiceError> {
        Ok(list_field(self.client.get(ENDPOINT)?, "projects"))
    }

    pub fn delete(&self, id: &str) -> Result<Value, ServiceError> {
        self.client.delete(&format!("{ENDPOINT}/{id}"))
    }
}
