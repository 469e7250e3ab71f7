//! Calling published services

use std::fmt;
use std::sync::Arc;

use ml_studio_core::http::error_message;
use ml_studio_core::{
    Error, HttpTransport, ParameterSchema, Request, Result, ReturnSchema, Transport, TypeTag, Value,
};
use serde_json::{json, Map, Value as Json};
use tracing::debug;

use crate::descriptor::{ServiceDescriptor, DEFAULT_INPUT_NAME, DEFAULT_OUTPUT_NAME};

/// Proxy for a published service
///
/// Arguments are encoded with the parameter schema, sent as input records and
/// the results decoded with the return schema.
#[derive(Clone)]
pub struct ServiceProxy {
    /// Service connection details
    descriptor: ServiceDescriptor,

    /// Declared parameters
    parameters: ParameterSchema,

    /// Declared result shape
    returns: ReturnSchema,

    /// Transport used for every call
    transport: Arc<dyn Transport>,
}

/// Connect to a published service over HTTPS with default input and output names
pub fn consume(url: &str, api_key: &str, parameters: ParameterSchema, returns: ReturnSchema) -> Result<ServiceProxy> {
    consume_with_names(url, api_key, parameters, returns, DEFAULT_INPUT_NAME, DEFAULT_OUTPUT_NAME)
}

/// Connect to a published service whose input and output are not the defaults
pub fn consume_with_names(
    url: &str,
    api_key: &str,
    parameters: ParameterSchema,
    returns: ReturnSchema,
    input_name: &str,
    output_name: &str,
) -> Result<ServiceProxy> {
    let transport = HttpTransport::new()?;
    let descriptor = ServiceDescriptor::new(url, api_key)
        .with_input_name(input_name)
        .with_output_name(output_name);
    Ok(ServiceProxy::new(descriptor, parameters, returns, Arc::new(transport)))
}

impl ServiceProxy {
    /// Create a proxy over an explicit transport
    pub fn new(
        descriptor: ServiceDescriptor,
        parameters: ParameterSchema,
        returns: ReturnSchema,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            descriptor,
            parameters,
            returns,
            transport,
        }
    }

    /// Service connection details
    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    /// Declared parameters
    pub fn parameters(&self) -> &ParameterSchema {
        &self.parameters
    }

    /// Declared result shape
    pub fn returns(&self) -> &ReturnSchema {
        &self.returns
    }

    /// Call the service with positional arguments
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        let row = self.parameters.encode_row(args)?;
        let table = self.invoke(vec![row])?;
        self.decode_row(&table, &table.rows[0])
    }

    /// Call the service with named arguments
    pub fn call_named(&self, args: Vec<(String, Value)>) -> Result<Value> {
        let args = self.parameters.order_named(args)?;
        self.call(&args)
    }

    /// Call the service once per argument row in a single request
    ///
    /// Results come back in input order, one per row.
    pub fn map(&self, rows: &[Vec<Value>]) -> Result<Vec<Value>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let encoded = rows
            .iter()
            .map(|args| self.parameters.encode_row(args))
            .collect::<Result<Vec<_>>>()?;

        let table = self.invoke(encoded)?;
        table.rows.iter().map(|row| self.decode_row(&table, row)).collect()
    }

    /// Decode one result row
    ///
    /// With the default result shape, a response carrying several columns is
    /// read as a dict keyed by column name using the reported column types.
    fn decode_row(&self, table: &ResultTable, row: &[String]) -> Result<Value> {
        match &table.columns {
            Some(columns) if columns.len() > 1 && self.returns == ReturnSchema::default() => {
                decode_reported_columns(columns, table.column_types.as_deref(), row)
            }
            _ => self.returns.decode_row(row),
        }
    }

    fn invoke(&self, rows: Vec<Vec<String>>) -> Result<ResultTable> {
        let expected = rows.len();

        let mut inputs = Map::new();
        inputs.insert(
            self.descriptor.input_name.clone(),
            json!({
                "ColumnNames": self.parameters.names(),
                "Values": rows,
            }),
        );
        let body = json!({
            "Inputs": inputs,
            "GlobalParameters": {},
        });

        debug!(url = %self.descriptor.url, rows = expected, "invoking service");
        let request = Request::post(self.descriptor.url.as_str())
            .bearer(&self.descriptor.api_key)
            .json(&body)?;
        let response = self.transport.send(request)?;

        if !response.is_success() {
            let body = response.text();
            if let Some(message) = error_message(&body) {
                debug!(status = response.status, message = %message, "service returned an error");
            }
            return Err(Error::Http {
                status: response.status,
                body,
            });
        }

        let parsed: Json = response.json()?;
        let table = self.result_table(&parsed)?;
        if table.rows.len() != expected {
            return Err(Error::Protocol(format!(
                "sent {} input rows but received {} result rows",
                expected,
                table.rows.len()
            )));
        }

        Ok(table)
    }

    fn result_table(&self, response: &Json) -> Result<ResultTable> {
        let output = &self.descriptor.output_name;
        let value = response
            .get("Results")
            .and_then(|r| r.get(output))
            .and_then(|o| o.get("value"))
            .ok_or_else(|| Error::Protocol(format!("response has no output `{}`", output)))?;
        let values = value
            .get("Values")
            .and_then(Json::as_array)
            .ok_or_else(|| Error::Protocol(format!("response has no values for output `{}`", output)))?;

        let rows = values
            .iter()
            .map(|row| {
                row.as_array()
                    .ok_or_else(|| Error::Protocol(format!("result row is not an array: {}", row)))?
                    .iter()
                    .map(cell_text)
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ResultTable {
            columns: string_list(value.get("ColumnNames")),
            column_types: string_list(value.get("ColumnTypes")),
            rows,
        })
    }
}

/// Rows of one service output with the column metadata reported alongside
struct ResultTable {
    columns: Option<Vec<String>>,
    column_types: Option<Vec<String>>,
    rows: Vec<Vec<String>>,
}

/// Text of a result cell; the service normally returns strings
fn cell_text(cell: &Json) -> Result<String> {
    match cell {
        Json::String(text) => Ok(text.clone()),
        Json::Null => Err(Error::Protocol("result row has a null cell".into())),
        other => Ok(other.to_string()),
    }
}

fn string_list(value: Option<&Json>) -> Option<Vec<String>> {
    value?
        .as_array()?
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect()
}

fn decode_reported_columns(columns: &[String], types: Option<&[String]>, row: &[String]) -> Result<Value> {
    let types = types
        .filter(|types| types.len() == columns.len())
        .ok_or_else(|| Error::Protocol("response has no column type for every result column".into()))?;
    if row.len() != columns.len() {
        return Err(Error::Protocol(format!(
            "expected {} result columns, got {}",
            columns.len(),
            row.len()
        )));
    }

    columns
        .iter()
        .zip(types)
        .zip(row)
        .map(|((name, kind), cell)| {
            // Columns of a type with no interop tag are handed back as text
            let tag = TypeTag::from_column_type(kind).unwrap_or(TypeTag::Text);
            Ok((Value::Text(name.clone()), tag.decode(cell)?))
        })
        .collect::<Result<Vec<_>>>()
        .map(Value::Dict)
}

impl fmt::Debug for ServiceProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceProxy")
            .field("url", &self.descriptor.url)
            .field("parameters", &self.parameters)
            .field("returns", &self.returns)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ml_studio_core::{Method, MockTransport, Response};

    const URL: &str = "https://svc.test/workspaces/ws/services/abc/execute?api-version=2.0";

    /// Transport that adds the two integer inputs of every row
    fn adding_service() -> MockTransport {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|r| r.method == Method::Post && r.url == URL && r.header_value("authorization") == Some("bearer key"))
            .returning(|request| {
                let body = request.json_body()?;
                let input = &body["Inputs"]["input1"];
                assert_eq!(input["ColumnNames"], json!(["a", "b"]));
                assert_eq!(body["GlobalParameters"], json!({}));

                let values: Vec<Json> = input["Values"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .map(|row| {
                        let a: i64 = row[0].as_str().unwrap().parse().unwrap();
                        let b: i64 = row[1].as_str().unwrap().parse().unwrap();
                        json!([(a + b).to_string()])
                    })
                    .collect();

                Ok(Response::json_response(
                    200,
                    &json!({"Results": {"output1": {"value": {
                        "ColumnNames": ["result"],
                        "ColumnTypes": ["Int64"],
                        "Values": values,
                    }}}}),
                ))
            });
        transport
    }

    fn proxy(transport: MockTransport) -> ServiceProxy {
        ServiceProxy::new(
            ServiceDescriptor::new(URL, "key"),
            ParameterSchema::typed([("a", TypeTag::Int), ("b", TypeTag::Int)]).unwrap(),
            ReturnSchema::Single(TypeTag::Int),
            Arc::new(transport),
        )
    }

    fn static_response(status: u16, body: Json) -> MockTransport {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .returning(move |_| Ok(Response::json_response(status, &body)));
        transport
    }

    #[test]
    fn test_consume_with_names() {
        let params = ParameterSchema::typed([("x", TypeTag::Int)]).unwrap();
        let proxy = consume_with_names(URL, "key", params, ReturnSchema::default(), "data", "scores").unwrap();
        assert_eq!(proxy.descriptor().input_name, "data");
        assert_eq!(proxy.descriptor().output_name, "scores");
        assert_eq!(proxy.descriptor().api_key, "key");
    }

    #[test]
    fn test_call() {
        let proxy = proxy(adding_service());
        assert_eq!(proxy.call(&[Value::Int(1), Value::Int(2)]).unwrap(), Value::Int(3));
    }

    #[test]
    fn test_call_named() {
        let proxy = proxy(adding_service());
        let result = proxy
            .call_named(vec![("b".into(), Value::Int(40)), ("a".into(), Value::Int(2))])
            .unwrap();
        assert_eq!(result, Value::Int(42));
    }

    #[test]
    fn test_map_matches_sequential_calls() {
        let proxy = proxy(adding_service());
        let rows = vec![vec![Value::Int(1), Value::Int(2)], vec![Value::Int(3), Value::Int(4)]];

        let mapped = proxy.map(&rows).unwrap();
        let called: Vec<Value> = rows.iter().map(|row| proxy.call(row).unwrap()).collect();
        assert_eq!(mapped, called);
        assert_eq!(mapped, vec![Value::Int(3), Value::Int(7)]);
    }

    #[test]
    fn test_map_empty() {
        let mut transport = MockTransport::new();
        transport.expect_send().times(0);
        assert!(proxy(transport).map(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_type_mismatch_before_request() {
        let mut transport = MockTransport::new();
        transport.expect_send().times(0);

        let err = proxy(transport).call(&[Value::Int(1), Value::from("two")]).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch(_)));
    }

    #[test]
    fn test_error_status() {
        let body = json!({"error": {"code": "ModuleExecutionError", "message": "failed",
            "details": [{"code": "85", "message": "division by zero"}]}});
        let err = proxy(static_response(400, body)).call(&[Value::Int(1), Value::Int(0)]).unwrap_err();

        match err {
            Error::Http { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(error_message(&body).as_deref(), Some("division by zero"));
            }
            other => panic!("expected HTTP error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_output() {
        let body = json!({"Results": {"other": {"value": {"Values": [["1"]]}}}});
        let err = proxy(static_response(200, body)).call(&[Value::Int(1), Value::Int(0)]).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_wrong_row_count() {
        let body = json!({"Results": {"output1": {"value": {"Values": [["1"], ["2"]]}}}});
        let err = proxy(static_response(200, body)).call(&[Value::Int(1), Value::Int(0)]).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_null_cell_is_a_protocol_error() {
        let body = json!({"Results": {"output1": {"value": {"Values": [[null]]}}}});
        let proxy = ServiceProxy::new(
            ServiceDescriptor::new(URL, "key"),
            ParameterSchema::typed([("x", TypeTag::Text)]).unwrap(),
            ReturnSchema::Single(TypeTag::Text),
            Arc::new(static_response(200, body)),
        );

        let err = proxy.call(&[Value::from("x")]).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_untyped_columns_use_reported_types() {
        let body = json!({"Results": {"output1": {"value": {
            "ColumnNames": ["count", "mean", "label"],
            "ColumnTypes": ["Int64", "Double", "String"],
            "Values": [["3", "1.5", "ok"]],
        }}}});
        let proxy = ServiceProxy::new(
            ServiceDescriptor::new(URL, "key"),
            ParameterSchema::typed([("x", TypeTag::Int)]).unwrap(),
            ReturnSchema::default(),
            Arc::new(static_response(200, body)),
        );

        let result = proxy.call(&[Value::Int(1)]).unwrap();
        assert_eq!(
            result,
            Value::Dict(vec![
                (Value::from("count"), Value::Int(3)),
                (Value::from("mean"), Value::Float(1.5)),
                (Value::from("label"), Value::from("ok")),
            ])
        );
    }

    #[test]
    fn test_untyped_columns_need_types() {
        let body = json!({"Results": {"output1": {"value": {
            "ColumnNames": ["a", "b"],
            "Values": [["1", "2"]],
        }}}});
        let proxy = ServiceProxy::new(
            ServiceDescriptor::new(URL, "key"),
            ParameterSchema::typed([("x", TypeTag::Int)]).unwrap(),
            ReturnSchema::default(),
            Arc::new(static_response(200, body)),
        );

        assert!(matches!(proxy.call(&[Value::Int(1)]), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_custom_names_and_tuple_results() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|r| r.json_body().map_or(false, |b| b["Inputs"].get("data").is_some()))
            .returning(|_| {
                Ok(Response::json_response(
                    200,
                    &json!({"Results": {"scores": {"value": {
                        "ColumnNames": ["result0", "result1"],
                        "Values": [["0.25", "True"]],
                    }}}}),
                ))
            });

        let proxy = ServiceProxy::new(
            ServiceDescriptor::new(URL, "key").with_input_name("data").with_output_name("scores"),
            ParameterSchema::typed([("x", TypeTag::Float)]).unwrap(),
            ReturnSchema::Tuple(vec![TypeTag::Float, TypeTag::Bool]),
            Arc::new(transport),
        );

        let result = proxy.call(&[Value::Float(0.5)]).unwrap();
        assert_eq!(result, Value::Tuple(vec![Value::Float(0.25), Value::Bool(true)]));
    }
}
