//! Publishing functions as web services

use std::sync::Arc;

use ml_studio_core::http::join_url;
use ml_studio_core::{
    Error, HttpTransport, ParameterSchema, Request, Result, ReturnSchema, SettingsOverrides, Transport,
    WorkspaceSettings,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::attachment::{Attachment, AttachmentSet};
use crate::consume::ServiceProxy;
use crate::descriptor::{ServiceDescriptor, DEFAULT_INPUT_NAME, DEFAULT_OUTPUT_NAME};
use crate::function::RemoteFunction;
use crate::package::{package, FunctionPackage};
use crate::script::{entry_script, InputMode};

/// Language tag of the generated entry script
pub const DEFAULT_LANGUAGE: &str = "python-2.7-64";

/// How to publish a function
#[derive(Debug, Clone)]
pub struct PublishOptions {
    /// Parameter types; `None` sends every parameter with the opaque encoding
    ///
    /// With [`InputMode::Frame`] this names the columns of the input frame and
    /// is required.
    pub parameters: Option<ParameterSchema>,

    /// Whether the function takes one row at a time or the whole input frame
    pub input_mode: InputMode,

    /// Result shape
    pub returns: ReturnSchema,

    /// Files shipped with the function
    pub attachments: Vec<Attachment>,

    /// Existing service to update in place
    pub service_id: Option<String>,

    /// Service name; defaults to the function name
    pub name: Option<String>,

    /// Name of the service input
    pub input_name: Option<String>,

    /// Name of the service output
    pub output_name: Option<String>,

    /// Language tag of the entry script
    pub language: String,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            parameters: None,
            input_mode: InputMode::default(),
            returns: ReturnSchema::default(),
            attachments: Vec::new(),
            service_id: None,
            name: None,
            input_name: None,
            output_name: None,
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

/// A published service
#[derive(Debug, Clone)]
pub struct PublishResult {
    /// Connection details
    pub descriptor: ServiceDescriptor,

    /// Parameter schema the service was published with
    pub parameters: ParameterSchema,

    /// Result shape the service was published with
    pub returns: ReturnSchema,

    /// Package that was uploaded
    pub package: FunctionPackage,
}

impl PublishResult {
    /// Proxy for calling the published service
    pub fn proxy(&self, transport: Arc<dyn Transport>) -> ServiceProxy {
        ServiceProxy::new(
            self.descriptor.clone(),
            self.parameters.clone(),
            self.returns.clone(),
            transport,
        )
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceDefinition<'a> {
    name: &'a str,
    #[serde(rename = "Type")]
    kind: &'static str,
    code_bundle: CodeBundle<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct CodeBundle<'a> {
    input_schema: Json,
    output_schema: Json,
    language: &'a str,
    source_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    zip_contents: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceCreated {
    default_endpoint_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EndpointDetails {
    api_location: Option<String>,
    primary_key: Option<String>,
    help_location: Option<String>,
}

/// Publishes functions to one workspace
#[derive(Clone)]
pub struct Publisher {
    /// Workspace the services are created in
    settings: WorkspaceSettings,

    /// Transport used for the management API
    transport: Arc<dyn Transport>,
}

impl Publisher {
    /// Create a publisher over an explicit transport
    pub fn new(settings: WorkspaceSettings, transport: Arc<dyn Transport>) -> Self {
        Self { settings, transport }
    }

    /// Resolve settings (explicit values, then `~/.azureml`) and publish over HTTPS
    pub fn connect(overrides: SettingsOverrides) -> Result<Self> {
        let settings = WorkspaceSettings::resolve(overrides)?;
        let transport = HttpTransport::new()?;
        Ok(Self::new(settings, Arc::new(transport)))
    }

    /// Workspace settings
    pub fn settings(&self) -> &WorkspaceSettings {
        &self.settings
    }

    /// Publish a function, or update the service named by `options.service_id`
    ///
    /// Packaging and attachment errors are reported before anything is sent.
    /// The function itself is not modified.
    pub fn publish(&self, function: &RemoteFunction, options: &PublishOptions) -> Result<PublishResult> {
        let parameters = parameter_schema(function, options.parameters.as_ref(), options.input_mode)?;
        let package = package(function)?;
        let attachments = AttachmentSet::resolve(&options.attachments)?;

        for parameter in parameters.opaque_parameters() {
            warn!(
                function = function.name(),
                parameter = %parameter.name,
                "parameter has no interop type; only this SDK can encode its values"
            );
        }

        let source_code = entry_script(
            function.name(),
            &package,
            &parameters,
            &options.returns,
            options.input_mode,
        );
        let zip_contents = if attachments.is_empty() {
            None
        } else {
            Some(attachments.to_base64_zip()?)
        };

        let definition = ServiceDefinition {
            name: options.name.as_deref().unwrap_or(function.name()),
            kind: "Code",
            code_bundle: CodeBundle {
                input_schema: parameters.to_json(),
                output_schema: options.returns.to_json(),
                language: &options.language,
                source_code,
                zip_contents,
            },
        };

        let service_id = options
            .service_id
            .as_ref()
            .map_or_else(|| Uuid::new_v4().simple().to_string(), |id| id.replace('-', ""));
        let service_url = join_url(
            &self.settings.management_endpoint,
            &format!("workspaces/{}/webservices/{}", self.settings.workspace_id, service_id),
        );

        debug!(
            function = function.name(),
            service_id = %service_id,
            attachments = attachments.len(),
            source_backed = package.is_source_backed(),
            "publishing service"
        );

        let request = Request::put(service_url.as_str())
            .bearer(&self.settings.authorization_token)
            .json(&definition)?;
        let created: ServiceCreated = self.transport.send(request)?.error_for_status()?.json()?;
        let endpoint_name = created
            .default_endpoint_name
            .ok_or_else(|| Error::Protocol("service response has no DefaultEndpointName".into()))?;

        let request = Request::get(format!("{}/endpoints/{}", service_url, endpoint_name))
            .bearer(&self.settings.authorization_token);
        let endpoint: EndpointDetails = self.transport.send(request)?.error_for_status()?.json()?;

        let missing = |field: &str| Error::Protocol(format!("endpoint response has no {}", field));
        let api_location = endpoint.api_location.ok_or_else(|| missing("ApiLocation"))?;
        let api_key = endpoint.primary_key.ok_or_else(|| missing("PrimaryKey"))?;
        let help_location = endpoint.help_location.ok_or_else(|| missing("HelpLocation"))?;

        let descriptor = ServiceDescriptor {
            url: format!("{}/execute?api-version=2.0", api_location),
            api_key,
            service_id: Some(service_id),
            help_url: Some(format!("{}/score", help_location)),
            input_name: options.input_name.clone().unwrap_or_else(|| DEFAULT_INPUT_NAME.to_string()),
            output_name: options.output_name.clone().unwrap_or_else(|| DEFAULT_OUTPUT_NAME.to_string()),
        };

        info!(function = function.name(), url = %descriptor.url, "published service");
        Ok(PublishResult {
            descriptor,
            parameters,
            returns: options.returns.clone(),
            package,
        })
    }
}

/// Publish a function over HTTPS using the given workspace settings
pub fn publish(function: &RemoteFunction, settings: WorkspaceSettings, options: &PublishOptions) -> Result<PublishResult> {
    let transport = HttpTransport::new()?;
    Publisher::new(settings, Arc::new(transport)).publish(function, options)
}

/// The declared schema, which must name the function's parameters in order
///
/// A frame function takes the frame as its only parameter and the schema
/// describes the frame's columns instead.
fn parameter_schema(
    function: &RemoteFunction,
    declared: Option<&ParameterSchema>,
    mode: InputMode,
) -> Result<ParameterSchema> {
    if mode == InputMode::Frame {
        if function.params().len() != 1 {
            return Err(Error::InvalidArgument(format!(
                "frame function `{}` must take exactly one parameter",
                function.name()
            )));
        }
        return declared.cloned().ok_or_else(|| {
            Error::InvalidArgument(format!("frame function `{}` needs a column schema", function.name()))
        });
    }

    let Some(schema) = declared else {
        return ParameterSchema::untyped(function.params().iter().map(String::as_str));
    };

    if schema.names() != function.params() {
        return Err(Error::InvalidArgument(format!(
            "schema {} does not match the parameters of `{}`: {}",
            schema,
            function.name(),
            function.params().join(", ")
        )));
    }

    Ok(schema.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ml_studio_core::types::opaque;
    use ml_studio_core::{Method, MockTransport, Response, TypeTag, Value};
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SERVICE_ID: &str = "0a1b2c3d4e5f60718293a4b5c6d7e8f9";

    fn settings() -> WorkspaceSettings {
        WorkspaceSettings::new("ws", "workspace-token").with_management_endpoint("https://mgmt.test")
    }

    fn add() -> RemoteFunction {
        RemoteFunction::new("add", ["a", "b"])
            .with_inline_body("def add(a, b):\n    return a + b + offset\n", ["offset"])
            .bind("offset", 0)
            .with_local(|args| match (args[0].as_int(), args[1].as_int()) {
                (Some(a), Some(b)) => Ok(Value::Int(a + b)),
                _ => Err(Error::TypeMismatch("expected integers".into())),
            })
    }

    fn typed_options() -> PublishOptions {
        PublishOptions {
            parameters: Some(ParameterSchema::typed([("a", TypeTag::Int), ("b", TypeTag::Int)]).unwrap()),
            returns: ReturnSchema::Single(TypeTag::Int),
            ..Default::default()
        }
    }

    /// Expect one PUT for `service_id` and the follow-up endpoint lookup
    fn management_api(transport: &mut MockTransport, service_id: &'static str) {
        transport
            .expect_send()
            .withf(move |r| {
                r.method == Method::Put
                    && r.url == format!("https://mgmt.test/workspaces/ws/webservices/{}", service_id)
                    && r.header_value("authorization") == Some("bearer workspace-token")
            })
            .times(1)
            .returning(|_| Ok(Response::json_response(200, &json!({"DefaultEndpointName": "default"}))));
        transport
            .expect_send()
            .withf(move |r| {
                r.method == Method::Get
                    && r.url == format!("https://mgmt.test/workspaces/ws/webservices/{}/endpoints/default", service_id)
            })
            .times(1)
            .returning(|_| {
                Ok(Response::json_response(
                    200,
                    &json!({
                        "ApiLocation": "https://svc.test/workspaces/ws/services/abc",
                        "PrimaryKey": "service-key",
                        "HelpLocation": "https://help.test/abc"
                    }),
                ))
            });
    }

    #[test]
    fn test_publish_with_service_id() {
        let mut transport = MockTransport::new();
        management_api(&mut transport, SERVICE_ID);

        let options = PublishOptions {
            service_id: Some("0a1b2c3d-4e5f-6071-8293-a4b5c6d7e8f9".into()),
            ..typed_options()
        };
        let result = Publisher::new(settings(), Arc::new(transport)).publish(&add(), &options).unwrap();

        let descriptor = &result.descriptor;
        assert_eq!(descriptor.url, "https://svc.test/workspaces/ws/services/abc/execute?api-version=2.0");
        assert_eq!(descriptor.api_key, "service-key");
        assert_eq!(descriptor.help_url.as_deref(), Some("https://help.test/abc/score"));
        assert_eq!(descriptor.service_id.as_deref(), Some(SERVICE_ID));
        assert_eq!(descriptor.input_name, "input1");
        assert_eq!(descriptor.output_name, "output1");
    }

    #[test]
    fn test_service_definition_body() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|r| r.method == Method::Put)
            .times(1)
            .returning(|request| {
                let body = request.json_body()?;
                assert_eq!(body["Name"], "adder");
                assert_eq!(body["Type"], "Code");

                let bundle = &body["CodeBundle"];
                assert_eq!(
                    bundle["InputSchema"],
                    json!({"a": {"type": "integer", "format": "int64"}, "b": {"type": "integer", "format": "int64"}})
                );
                assert_eq!(bundle["OutputSchema"], json!({"result": {"type": "integer", "format": "int64"}}));
                assert_eq!(bundle["Language"], "python-2.7-64");
                assert!(bundle["SourceCode"].as_str().unwrap().contains("def azureml_main(df1=None, df2=None):"));
                assert!(bundle.get("ZipContents").is_none());

                Ok(Response::json_response(200, &json!({"DefaultEndpointName": "default"})))
            });
        transport
            .expect_send()
            .withf(|r| r.method == Method::Get)
            .returning(|_| {
                Ok(Response::json_response(
                    200,
                    &json!({"ApiLocation": "https://svc.test/a", "PrimaryKey": "k", "HelpLocation": "https://help.test/a"}),
                ))
            });

        let options = PublishOptions {
            name: Some("adder".into()),
            ..typed_options()
        };
        let result = Publisher::new(settings(), Arc::new(transport)).publish(&add(), &options).unwrap();

        // A fresh id is a simple-form UUID
        let service_id = result.descriptor.service_id.unwrap();
        assert_eq!(service_id.len(), 32);
        assert!(service_id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_attachments_are_zipped() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|r| {
                r.method == Method::Put
                    && r.json_body().map_or(false, |b| b["CodeBundle"]["ZipContents"].is_string())
            })
            .times(1)
            .returning(|_| Ok(Response::json_response(200, &json!({"DefaultEndpointName": "default"}))));
        transport
            .expect_send()
            .withf(|r| r.method == Method::Get)
            .returning(|_| {
                Ok(Response::json_response(
                    200,
                    &json!({"ApiLocation": "https://svc.test/a", "PrimaryKey": "k", "HelpLocation": "https://help.test/a"}),
                ))
            });

        let options = PublishOptions {
            attachments: vec![Attachment::bytes("lookup.csv", "key,value\n")],
            ..typed_options()
        };
        Publisher::new(settings(), Arc::new(transport)).publish(&add(), &options).unwrap();
    }

    #[test]
    fn test_source_backed_publish() {
        let mut module = NamedTempFile::new().unwrap();
        module.write_all(b"def add(a, b):\n    return a + b\n").unwrap();

        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|r| {
                r.method == Method::Put
                    && r.json_body().map_or(false, |b| {
                        b["CodeBundle"]["SourceCode"]
                            .as_str()
                            .map_or(false, |s| s.contains("def add(a, b):\n    return a + b\n\n__user_function = add\n"))
                    })
            })
            .times(1)
            .returning(|_| Ok(Response::json_response(200, &json!({"DefaultEndpointName": "default"}))));
        transport
            .expect_send()
            .withf(|r| r.method == Method::Get)
            .returning(|_| {
                Ok(Response::json_response(
                    200,
                    &json!({"ApiLocation": "https://svc.test/a", "PrimaryKey": "k", "HelpLocation": "https://help.test/a"}),
                ))
            });

        let function = add().with_source_file(module.path());
        let result = Publisher::new(settings(), Arc::new(transport))
            .publish(&function, &typed_options())
            .unwrap();
        assert!(result.package.is_source_backed());
    }

    #[test]
    fn test_missing_dependency_sends_nothing() {
        let mut transport = MockTransport::new();
        transport.expect_send().times(0);

        let function = RemoteFunction::new("scale", ["x"]).with_inline_body("def scale(x):\n    return x * k\n", ["k"]);
        let err = Publisher::new(settings(), Arc::new(transport))
            .publish(&function, &PublishOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::MissingDependency { ref symbol } if symbol == "k"));
    }

    #[test]
    fn test_missing_attachment_sends_nothing() {
        let mut transport = MockTransport::new();
        transport.expect_send().times(0);

        let options = PublishOptions {
            attachments: vec![Attachment::file("no/such/file.bin")],
            ..typed_options()
        };
        let err = Publisher::new(settings(), Arc::new(transport)).publish(&add(), &options).unwrap_err();
        assert!(matches!(err, Error::AttachmentNotFound { .. }));
    }

    #[test]
    fn test_schema_must_match_parameters() {
        let mut transport = MockTransport::new();
        transport.expect_send().times(0);

        let options = PublishOptions {
            parameters: Some(ParameterSchema::typed([("b", TypeTag::Int), ("a", TypeTag::Int)]).unwrap()),
            ..Default::default()
        };
        let err = Publisher::new(settings(), Arc::new(transport)).publish(&add(), &options).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    fn totals() -> RemoteFunction {
        RemoteFunction::new("totals", ["df"])
            .with_inline_body("def totals(df):\n    return pandas.DataFrame({'total': df['a'] + df['b']})\n", Vec::new())
    }

    fn frame_options() -> PublishOptions {
        PublishOptions {
            parameters: Some(ParameterSchema::typed([("a", TypeTag::Int), ("b", TypeTag::Int)]).unwrap()),
            input_mode: InputMode::Frame,
            returns: ReturnSchema::Named(vec![("total".into(), TypeTag::Int)]),
            ..Default::default()
        }
    }

    #[test]
    fn test_frame_publish() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|r| r.method == Method::Put)
            .times(1)
            .returning(|request| {
                let body = request.json_body()?;
                let bundle = &body["CodeBundle"];
                assert_eq!(
                    bundle["InputSchema"],
                    json!({"a": {"type": "integer", "format": "int64"}, "b": {"type": "integer", "format": "int64"}})
                );
                assert_eq!(bundle["OutputSchema"], json!({"total": {"type": "integer", "format": "int64"}}));
                let source = bundle["SourceCode"].as_str().unwrap_or_default();
                assert!(source.contains("    return __user_function(df1)\n"));
                assert!(!source.contains("for i in range"));

                Ok(Response::json_response(200, &json!({"DefaultEndpointName": "default"})))
            });
        transport
            .expect_send()
            .withf(|r| r.method == Method::Get)
            .returning(|_| {
                Ok(Response::json_response(
                    200,
                    &json!({"ApiLocation": "https://svc.test/a", "PrimaryKey": "k", "HelpLocation": "https://help.test/a"}),
                ))
            });

        let result = Publisher::new(settings(), Arc::new(transport))
            .publish(&totals(), &frame_options())
            .unwrap();
        assert_eq!(result.parameters.names(), ["a", "b"]);
    }

    #[test]
    fn test_frame_publish_needs_column_schema() {
        let mut transport = MockTransport::new();
        transport.expect_send().times(0);

        let options = PublishOptions {
            parameters: None,
            ..frame_options()
        };
        let err = Publisher::new(settings(), Arc::new(transport))
            .publish(&totals(), &options)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_frame_function_takes_one_parameter() {
        let mut transport = MockTransport::new();
        transport.expect_send().times(0);

        let err = Publisher::new(settings(), Arc::new(transport))
            .publish(&add(), &frame_options())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(ref m) if m.contains("exactly one parameter")));
    }

    #[test]
    fn test_conflict() {
        let mut transport = MockTransport::new();
        transport.expect_send().times(1).returning(|_| {
            Ok(Response::json_response(
                409,
                &json!({"error": {"code": "Conflict", "message": "A service named add already exists"}}),
            ))
        });

        let err = Publisher::new(settings(), Arc::new(transport))
            .publish(&add(), &typed_options())
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { ref message, .. } if message == "A service named add already exists"));
    }

    #[test]
    fn test_missing_endpoint_fields() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|r| r.method == Method::Put)
            .returning(|_| Ok(Response::json_response(200, &json!({"DefaultEndpointName": "default"}))));
        transport
            .expect_send()
            .withf(|r| r.method == Method::Get)
            .returning(|_| Ok(Response::json_response(200, &json!({"ApiLocation": "https://svc.test/a"}))));

        let err = Publisher::new(settings(), Arc::new(transport))
            .publish(&add(), &typed_options())
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(ref m) if m.contains("PrimaryKey")));
    }

    #[test]
    fn test_untyped_parameters_are_opaque() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|r| {
                r.method == Method::Put
                    && r.json_body().map_or(false, |b| {
                        b["CodeBundle"]["InputSchema"]["a"] == json!({"type": "string", "format": "string"})
                    })
            })
            .times(1)
            .returning(|_| Ok(Response::json_response(200, &json!({"DefaultEndpointName": "default"}))));
        transport
            .expect_send()
            .withf(|r| r.method == Method::Get)
            .returning(|_| {
                Ok(Response::json_response(
                    200,
                    &json!({"ApiLocation": "https://svc.test/a", "PrimaryKey": "k", "HelpLocation": "https://help.test/a"}),
                ))
            });

        let result = Publisher::new(settings(), Arc::new(transport))
            .publish(&add(), &PublishOptions::default())
            .unwrap();
        assert_eq!(result.parameters.opaque_parameters().count(), 2);
    }

    #[test]
    fn test_published_function_stays_callable() {
        let mut management = MockTransport::new();
        management_api(&mut management, SERVICE_ID);

        let function = add();
        let options = PublishOptions {
            service_id: Some(SERVICE_ID.into()),
            ..typed_options()
        };
        let result = Publisher::new(settings(), Arc::new(management)).publish(&function, &options).unwrap();

        assert_eq!(function.call_local(&[Value::Int(2), Value::Int(3)]).unwrap(), Value::Int(5));

        let mut service = MockTransport::new();
        service
            .expect_send()
            .withf(|r| r.url == "https://svc.test/workspaces/ws/services/abc/execute?api-version=2.0"
                && r.header_value("authorization") == Some("bearer service-key"))
            .times(1)
            .returning(|_| {
                Ok(Response::json_response(
                    200,
                    &json!({"Results": {"output1": {"value": {"ColumnNames": ["result"], "Values": [["5"]]}}}}),
                ))
            });

        let proxy: ServiceProxy = result.proxy(Arc::new(service));
        assert_eq!(proxy.call(&[Value::Int(2), Value::Int(3)]).unwrap(), Value::Int(5));
    }

    #[test]
    fn test_inline_globals_reach_the_script() {
        let function = add().bind("offset", 7);
        let package = package(&function).unwrap();
        let FunctionPackage::InlineBacked { globals, .. } = package else {
            panic!("expected inline package");
        };
        assert_eq!(opaque::decode(&globals["offset"]).unwrap(), Value::Int(7));
    }
}
