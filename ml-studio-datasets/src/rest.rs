//! REST client for workspace datasets and experiments

use std::sync::Arc;

use ml_studio_core::http::join_url;
use ml_studio_core::{Request, Response, Transport};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info};

use crate::data_type::DataTypeId;
use crate::dataset::DatasetMetadata;
use crate::error::{Error, Result};
use crate::experiment::ExperimentMetadata;

const SERVICE_ROOT: &str = "api/";
const SESSION_ID_HEADER_NAME: &str = "x-ms-client-session-id";
const SESSION_ID_HEADER_VALUE: &str = "DefaultSession";
const ACCESS_TOKEN_HEADER_NAME: &str = "x-ms-metaanalytics-authorizationtoken";
const CONTENT_TYPE_HEADER_NAME: &str = "Content-Type";
const CONTENT_TYPE_HEADER_VALUE_JSON: &str = "application/json;charset=UTF8";
const USER_AGENT_HEADER_NAME: &str = "User-Agent";

/// Owner recorded on datasets uploaded by this client
pub const DEFAULT_OWNER: &str = "Rust SDK";

/// Size of each block of a chunked upload
pub const CHUNK_SIZE: usize = 0x0020_0000;

/// Client for the studio REST API of one endpoint
#[derive(Clone)]
pub struct RestClient {
    /// Studio API endpoint
    service_endpoint: String,

    /// Workspace authorization token
    access_token: String,

    /// Transport used for every request
    transport: Arc<dyn Transport>,
}

impl RestClient {
    /// Create a new REST client
    pub fn new(service_endpoint: &str, access_token: &str, transport: Arc<dyn Transport>) -> Self {
        Self {
            service_endpoint: service_endpoint.to_string(),
            access_token: access_token.to_string(),
            transport,
        }
    }

    /// List the experiments of a workspace
    pub fn get_experiments(&self, workspace_id: &str) -> Result<Vec<ExperimentMetadata>> {
        self.send_get(&format!("{}workspaces/{}/experiments", SERVICE_ROOT, workspace_id))
    }

    /// List the datasets of a workspace
    pub fn get_datasets(&self, workspace_id: &str) -> Result<Vec<DatasetMetadata>> {
        self.send_get(&format!("{}workspaces/{}/datasources", SERVICE_ROOT, workspace_id))
    }

    /// Get a single dataset
    pub fn get_dataset(&self, workspace_id: &str, dataset_id: &str) -> Result<DatasetMetadata> {
        self.send_get(&format!(
            "{}workspaces/{}/datasources/{}",
            SERVICE_ROOT, workspace_id, dataset_id
        ))
    }

    /// Read the contents of an intermediate dataset
    pub fn read_intermediate_dataset_contents(
        &self,
        workspace_id: &str,
        experiment_id: &str,
        node_id: &str,
        port_name: &str,
    ) -> Result<Vec<u8>> {
        let api_path = format!(
            "{}workspaces/{}/experiments/{}/outputdata/{}/{}",
            SERVICE_ROOT, workspace_id, experiment_id, node_id, port_name
        );
        let request = self.with_headers(Request::get(join_url(&self.service_endpoint, &api_path)), None);
        Ok(self.execute(request)?.body)
    }

    /// Read dataset contents from its download location
    ///
    /// The location carries its own access credential, so no workspace headers
    /// are sent.
    pub fn read_dataset_contents(&self, url: &str) -> Result<Vec<u8>> {
        Ok(self.execute(Request::get(url))?.body)
    }

    /// Upload raw data as a dataset and return the new dataset id
    ///
    /// The upload happens in three steps: reserve an upload id, send the data in
    /// [`CHUNK_SIZE`] blocks, then register the datasource metadata.
    pub fn upload_dataset(
        &self,
        workspace_id: &str,
        name: &str,
        description: &str,
        data_type_id: &DataTypeId,
        raw_data: &[u8],
        family_id: Option<&str>,
    ) -> Result<String> {
        let api_path = format!(
            "{}resourceuploads/workspaces/{}/?userStorage=true&dataTypeId={}",
            SERVICE_ROOT, workspace_id, data_type_id
        );
        let reserved: serde_json::Value = self.send_post(&api_path, Vec::new(), None)?;
        let upload_id = reserved
            .get("Id")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| ml_studio_core::Error::Protocol("upload reservation has no Id".into()))?
            .to_string();

        let total_chunks = raw_data.len().div_ceil(CHUNK_SIZE);
        debug!(upload_id = %upload_id, bytes = raw_data.len(), total_chunks, "uploading dataset contents");

        for (block_id, chunk) in raw_data.chunks(CHUNK_SIZE).enumerate() {
            let chunk_path = format!(
                "{}blobuploads/workspaces/{}/?numberOfBlocks={}&blockId={}&uploadId={}&dataTypeId={}",
                SERVICE_ROOT, workspace_id, total_chunks, block_id, upload_id, data_type_id
            );
            let _: serde_json::Value = self.send_post(&chunk_path, chunk.to_vec(), None)?;
        }

        let metadata = json!({
            "DataSource": {
                "Name": name,
                "DataTypeId": data_type_id.as_str(),
                "Description": description,
                "FamilyId": family_id,
                "Owner": DEFAULT_OWNER,
                "SourceOrigin": "FromResourceUpload",
            },
            "UploadId": upload_id,
            "UploadedFromFileName": "",
            "ClientPoll": true,
        });

        let api_path = format!("{}workspaces/{}/datasources", SERVICE_ROOT, workspace_id);
        let dataset_id: String = self
            .send_post(&api_path, serde_json::to_vec(&metadata)?, Some(CONTENT_TYPE_HEADER_VALUE_JSON))
            .map_err(|e| match e {
                Error::Core(ml_studio_core::Error::Conflict { body, .. }) => {
                    Error::Core(ml_studio_core::Error::Conflict {
                        message: format!("A data set named \"{}\" already exists", name),
                        body,
                    })
                }
                other => other,
            })?;

        info!(dataset_id = %dataset_id, name, "uploaded dataset");
        Ok(dataset_id)
    }

    fn send_get<T: DeserializeOwned>(&self, api_path: &str) -> Result<T> {
        let request = self.with_headers(Request::get(join_url(&self.service_endpoint, api_path)), None);
        Ok(self.execute(request)?.json()?)
    }

    fn send_post<T: DeserializeOwned>(&self, api_path: &str, data: Vec<u8>, content_type: Option<&str>) -> Result<T> {
        let request = self
            .with_headers(Request::post(join_url(&self.service_endpoint, api_path)), content_type)
            .body(data);
        Ok(self.execute(request)?.json()?)
    }

    fn execute(&self, request: Request) -> Result<Response> {
        let response = self.transport.send(request)?;
        Ok(response.error_for_status()?)
    }

    fn with_headers(&self, request: Request, content_type: Option<&str>) -> Request {
        request
            .header(USER_AGENT_HEADER_NAME, &format!("ml-studio-rs/{}", env!("CARGO_PKG_VERSION")))
            .header(CONTENT_TYPE_HEADER_NAME, content_type.unwrap_or(CONTENT_TYPE_HEADER_VALUE_JSON))
            .header(SESSION_ID_HEADER_NAME, SESSION_ID_HEADER_VALUE)
            .header(ACCESS_TOKEN_HEADER_NAME, &self.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ml_studio_core::{Method, MockTransport};

    fn client(transport: MockTransport) -> RestClient {
        RestClient::new("https://studio.test/", "token", Arc::new(transport))
    }

    #[test]
    fn test_get_sends_workspace_headers() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|r| {
                r.method == Method::Get
                    && r.url == "https://studio.test/api/workspaces/ws/experiments"
                    && r.header_value("x-ms-metaanalytics-authorizationtoken") == Some("token")
                    && r.header_value("x-ms-client-session-id") == Some("DefaultSession")
            })
            .times(1)
            .returning(|_| Ok(Response::new(200, "[]")));

        let experiments = client(transport).get_experiments("ws").unwrap();
        assert!(experiments.is_empty());
    }

    #[test]
    fn test_upload_in_chunks() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let raw = vec![b'x'; CHUNK_SIZE + 10];
        let mut transport = MockTransport::new();

        transport
            .expect_send()
            .withf(|r| r.url.contains("/resourceuploads/") && r.body.is_empty())
            .times(1)
            .returning(|_| Ok(Response::new(200, r#"{"Id":"up1"}"#)));
        transport
            .expect_send()
            .withf(|r| r.url.contains("numberOfBlocks=2&blockId=0&uploadId=up1") && r.body.len() == CHUNK_SIZE)
            .times(1)
            .returning(|_| Ok(Response::new(200, "{}")));
        transport
            .expect_send()
            .withf(|r| r.url.contains("numberOfBlocks=2&blockId=1&uploadId=up1") && r.body.len() == 10)
            .times(1)
            .returning(|_| Ok(Response::new(200, "{}")));
        transport
            .expect_send()
            .withf(|r| {
                r.url.ends_with("/api/workspaces/ws/datasources")
                    && r.json_body().map_or(false, |b| {
                        b["DataSource"]["Name"] == "sales"
                            && b["DataSource"]["DataTypeId"] == "GenericCSV"
                            && b["DataSource"]["Owner"] == DEFAULT_OWNER
                            && b["UploadId"] == "up1"
                    })
            })
            .times(1)
            .returning(|_| Ok(Response::new(200, "\"ds-1\"")));

        let id = client(transport)
            .upload_dataset("ws", "sales", "desc", &DataTypeId::GenericCsv, &raw, None)
            .unwrap();
        assert_eq!(id, "ds-1");
    }

    #[test]
    fn test_upload_name_conflict() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|r| r.url.contains("/resourceuploads/"))
            .returning(|_| Ok(Response::new(200, r#"{"Id":"up1"}"#)));
        transport
            .expect_send()
            .withf(|r| r.url.contains("/blobuploads/"))
            .returning(|_| Ok(Response::new(200, "{}")));
        transport
            .expect_send()
            .withf(|r| r.url.ends_with("/datasources"))
            .returning(|_| Ok(Response::new(409, "{}")));

        let err = client(transport)
            .upload_dataset("ws", "sales", "desc", &DataTypeId::GenericCsv, b"a\n1\n", None)
            .unwrap_err();

        match err {
            Error::Core(ml_studio_core::Error::Conflict { message, .. }) => {
                assert!(message.contains("\"sales\" already exists"));
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_http_error_propagates() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .returning(|_| Ok(Response::new(401, "denied")));

        let err = client(transport).get_datasets("ws").unwrap_err();
        assert!(matches!(err, Error::Core(ref e) if e.is_unauthorized()));
    }
}
