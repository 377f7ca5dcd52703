//! Parameter schemas
//!
//! Each tool declares its parameters once. The schema renders to the
//! JSON-schema object the inference endpoint expects and validates the
//! arguments a model sends before the executor ever sees them.

use serde::Serialize;
use serde_json::{Map, Value, json};

use super::ToolError;

/// Primitive type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Number,
    Integer,
    Boolean,
}

impl ParamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Number => "number",
            ParamKind::Integer => "integer",
            ParamKind::Boolean => "boolean",
        }
    }

    /// Accept the value as-is, or coerce the string forms models like to send
    fn coerce(&self, value: Value) -> Option<Value> {
        match (self, value) {
            (ParamKind::String, Value::String(s)) => Some(Value::String(s)),
            (ParamKind::String, Value::Number(n)) => Some(Value::String(n.to_string())),
            (ParamKind::Number, Value::Number(n)) => Some(Value::Number(n)),
            (ParamKind::Number, Value::String(s)) => s.trim().parse::<f64>().ok().map(|f| json!(f)),
            (ParamKind::Integer, Value::Number(n)) => {
                if n.is_i64() || n.is_u64() {
                    Some(Value::Number(n))
                } else {
                    n.as_f64().filter(|f| f.fract() == 0.0).map(|f| json!(f as i64))
                }
            }
            (ParamKind::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(|i| json!(i)),
            (ParamKind::Boolean, Value::Bool(b)) => Some(Value::Bool(b)),
            (ParamKind::Boolean, Value::String(s)) => match s.trim().to_lowercase().as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        }
    }
}

/// One named parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: ParamKind,
    pub description: &'static str,
    pub required: bool,
    #[serde(rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<&'static str>,
}

impl Parameter {
    /// An optional parameter
    pub fn new(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            description,
            required: false,
            enum_values: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Restrict a string parameter to fixed values
    pub fn one_of(mut self, values: &[&'static str]) -> Self {
        self.enum_values = values.to_vec();
        self
    }
}

/// The full parameter list of a tool
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ParameterSchema {
    params: Vec<Parameter>,
}

impl ParameterSchema {
    pub fn new(params: Vec<Parameter>) -> Self {
        Self { params }
    }

    /// A tool without parameters
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    /// Render as a JSON-schema object
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for p in &self.params {
            let mut prop = json!({
                "type": p.kind.as_str(),
                "description": p.description,
            });
            if !p.enum_values.is_empty() {
                prop["enum"] = json!(p.enum_values);
            }
            properties.insert(p.name.to_string(), prop);
        }

        let required: Vec<&str> = self.params.iter().filter(|p| p.required).map(|p| p.name).collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Check and normalize arguments
    ///
    /// Nulls count as absent. Undeclared arguments pass through untouched.
    pub fn validate(&self, mut args: Map<String, Value>) -> Result<Arguments, ToolError> {
        args.retain(|_, v| !v.is_null());

        for p in &self.params {
            let Some(value) = args.remove(p.name) else {
                if p.required {
                    return Err(ToolError::InvalidArguments(format!(
                        "missing required parameter '{}'",
                        p.name
                    )));
                }
                continue;
            };

            let value = p.kind.coerce(value).ok_or_else(|| {
                ToolError::InvalidArguments(format!("parameter '{}' must be {}", p.name, p.kind.as_str()))
            })?;

            if let Some(s) = value.as_str()
                && !p.enum_values.is_empty()
                && !p.enum_values.contains(&s)
            {
                return Err(ToolError::InvalidArguments(format!(
                    "parameter '{}' must be one of: {}",
                    p.name,
                    p.enum_values.join(", ")
                )));
            }

            args.insert(p.name.to_string(), value);
        }

        Ok(Arguments(args))
    }
}

/// Validated arguments handed to an executor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments(Map<String, Value>);

impl Arguments {
    /// Wrap raw arguments without validation
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn str(&self, name: &str) -> Result<&str, ToolError> {
        self.opt_str(name)
            .ok_or_else(|| ToolError::InvalidArguments(format!("missing required parameter '{}'", name)))
    }

    pub fn opt_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn opt_u64(&self, name: &str) -> Option<u64> {
        self.0.get(name).and_then(Value::as_u64)
    }

    pub fn opt_f64(&self, name: &str) -> Option<f64> {
        self.0.get(name).and_then(Value::as_f64)
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> ParameterSchema {
        ParameterSchema::new(vec![
            Parameter::new("path", ParamKind::String, "File path").required(),
            Parameter::new("lines", ParamKind::Integer, "Max lines"),
            Parameter::new("mode", ParamKind::String, "Write mode").one_of(&["write", "append"]),
        ])
    }

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_json_schema_rendering() {
        let rendered = schema().to_json_schema();
        assert_eq!(rendered["type"], "object");
        assert_eq!(rendered["properties"]["path"]["type"], "string");
        assert_eq!(rendered["properties"]["lines"]["type"], "integer");
        assert_eq!(rendered["properties"]["mode"]["enum"], json!(["write", "append"]));
        assert_eq!(rendered["required"], json!(["path"]));
    }

    #[test]
    fn test_empty_schema() {
        let rendered = ParameterSchema::empty().to_json_schema();
        assert_eq!(rendered["properties"], json!({}));
        assert_eq!(rendered["required"], json!([]));
    }

    #[test]
    fn test_validate_ok() {
        let args = schema().validate(map(json!({"path": "a.txt", "lines": 5}))).unwrap();
        assert_eq!(args.str("path").unwrap(), "a.txt");
        assert_eq!(args.opt_u64("lines"), Some(5));
        assert_eq!(args.opt_str("mode"), None);
    }

    #[test]
    fn test_validate_missing_required() {
        let err = schema().validate(map(json!({"lines": 5}))).unwrap_err();
        assert!(err.to_string().contains("missing required parameter 'path'"));
    }

    #[test]
    fn test_validate_null_is_absent() {
        let err = schema().validate(map(json!({"path": null}))).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));

        let args = schema().validate(map(json!({"path": "a", "lines": null}))).unwrap();
        assert_eq!(args.opt_u64("lines"), None);
    }

    #[test]
    fn test_validate_type_mismatch() {
        let err = schema().validate(map(json!({"path": "a", "lines": "many"}))).unwrap_err();
        assert!(err.to_string().contains("'lines' must be integer"));
    }

    #[test]
    fn test_validate_coerces_numeric_strings() {
        let args = schema().validate(map(json!({"path": 42, "lines": "7"}))).unwrap();
        assert_eq!(args.str("path").unwrap(), "42");
        assert_eq!(args.opt_u64("lines"), Some(7));
    }

    #[test]
    fn test_validate_whole_float_as_integer() {
        let args = schema().validate(map(json!({"path": "a", "lines": 3.0}))).unwrap();
        assert_eq!(args.opt_u64("lines"), Some(3));

        assert!(schema().validate(map(json!({"path": "a", "lines": 3.5}))).is_err());
    }

    #[test]
    fn test_validate_enum() {
        assert!(schema().validate(map(json!({"path": "a", "mode": "append"}))).is_ok());
        let err = schema().validate(map(json!({"path": "a", "mode": "delete"}))).unwrap_err();
        assert!(err.to_string().contains("one of: write, append"));
    }

    #[test]
    fn test_boolean_coercion() {
        let kind = ParamKind::Boolean;
        assert_eq!(kind.coerce(json!("TRUE")), Some(json!(true)));
        assert_eq!(kind.coerce(json!(false)), Some(json!(false)));
        assert_eq!(kind.coerce(json!("yes")), None);
    }

    #[test]
    fn test_undeclared_arguments_pass_through() {
        let args = schema().validate(map(json!({"path": "a", "extra": 1}))).unwrap();
        assert_eq!(args.get("extra"), Some(&json!(1)));
    }
}
