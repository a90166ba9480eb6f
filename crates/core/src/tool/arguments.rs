use std::collections::BTreeMap;

use grounded_agent_model::ToolCallRequest;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::Error;

/// Validated arguments of a tool call, a mapping from argument names to
/// string values.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ToolArguments(BTreeMap<String, String>);

impl ToolArguments {
    /// Parses the raw arguments text produced by the planner.
    ///
    /// Blank text means no arguments. Otherwise the text must be a JSON
    /// object whose values are all strings.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }

        let value: Value = serde_json::from_str(raw).map_err(|err| {
            Error::tool_invocation()
                .with_reason(format!("arguments are not valid JSON: {err}"))
        })?;
        let Value::Object(object) = value else {
            return Err(Error::tool_invocation()
                .with_reason("arguments must be a JSON object"));
        };

        object
            .into_iter()
            .map(|(name, value)| match value {
                Value::String(value) => Ok((name, value)),
                other => Err(Error::tool_invocation().with_reason(format!(
                    "argument `{name}` must be a string, got {other}"
                ))),
            })
            .collect::<Result<BTreeMap<_, _>, _>>()
            .map(Self)
    }

    /// Returns the value of an argument.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Returns the number of arguments.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no arguments.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Converts the arguments into the typed input of a tool.
    pub(crate) fn deserialize<T: DeserializeOwned>(self) -> Result<T, Error> {
        let object: Map<String, Value> = self
            .0
            .into_iter()
            .map(|(name, value)| (name, Value::String(value)))
            .collect();
        serde_json::from_value(Value::Object(object)).map_err(|err| {
            Error::tool_invocation().with_reason(format!("{err}"))
        })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ToolArguments {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

/// A tool call request whose arguments have been validated.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ToolCall {
    /// The unique identifier for the call.
    pub id: String,
    /// The name of the tool to call.
    pub tool_name: String,
    /// The arguments.
    pub arguments: ToolArguments,
}

impl ToolCall {
    /// Validates a raw request from the planner.
    pub fn parse(req: &ToolCallRequest) -> Result<Self, Error> {
        Ok(Self {
            id: req.id.clone(),
            tool_name: req.name.clone(),
            arguments: ToolArguments::parse(&req.arguments)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;
    use crate::tool::ErrorKind;

    #[test]
    fn test_parse() {
        let args = ToolArguments::parse(r#"{"query": "MATCH (n) RETURN n"}"#)
            .unwrap();
        assert_eq!(args.get("query"), Some("MATCH (n) RETURN n"));
        assert_eq!(args.len(), 1);

        assert!(ToolArguments::parse("").unwrap().is_empty());
        assert!(ToolArguments::parse("  ").unwrap().is_empty());
        assert!(ToolArguments::parse("{}").unwrap().is_empty());
    }

    #[test]
    fn test_parse_malformed() {
        for raw in [
            r#"{"query": "MATCH"#,
            r#"["MATCH (n) RETURN n"]"#,
            r#""MATCH (n) RETURN n""#,
            r#"{"query": 42}"#,
            r#"{"query": {"text": "MATCH"}}"#,
            r#"{"query": null}"#,
        ] {
            let err = ToolArguments::parse(raw).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ToolInvocation, "{raw}");
        }
    }

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct QueryInput {
        query: String,
    }

    #[test]
    fn test_deserialize() {
        let args: ToolArguments = [("query", "RETURN 1")].into_iter().collect();
        let input: QueryInput = args.deserialize().unwrap();
        assert_eq!(input.query, "RETURN 1");

        let err = ToolArguments::default()
            .deserialize::<QueryInput>()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ToolInvocation);
        assert!(err.reason().contains("query"));

        let args: ToolArguments =
            [("query", "RETURN 1"), ("limit", "3")].into_iter().collect();
        let err = args.deserialize::<QueryInput>().unwrap_err();
        assert!(err.reason().contains("limit"));
    }

    #[test]
    fn test_tool_call_parse() {
        let call = ToolCall::parse(&ToolCallRequest {
            id: "call_0".to_owned(),
            name: "query_graph".to_owned(),
            arguments: r#"{"query": "RETURN 1"}"#.to_owned(),
        })
        .unwrap();
        assert_eq!(call.id, "call_0");
        assert_eq!(call.tool_name, "query_graph");
        assert_eq!(call.arguments.get("query"), Some("RETURN 1"));
    }
}
