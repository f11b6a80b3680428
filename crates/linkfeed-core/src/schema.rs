//! Declarative request-parameter schema.
//!
//! The schema is read once at startup from a YAML document shaped like a
//! small subset of OpenAPI:
//!
//! ```yaml
//! paths:
//!   /posts:
//!     get:
//!       parameters:
//!         - name: limit
//!           type: integer
//!           minimum: 1
//!         - name: order
//!           type: string
//!           pattern: "^(id|url|title|created_at)$"
//!   /health:
//!     get: {}
//! ```
//!
//! Constraints may also be nested under a `schema:` key, OpenAPI style.
//! Everything is validated and compiled at load time; the resulting
//! [`ParameterSchema`] is immutable.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

/// Failure to load the schema document. Always fatal at startup.
#[derive(Error, Debug)]
pub enum SchemaLoadError {
    /// The document could not be read.
    #[error("Failed to read schema document {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid YAML or does not have the expected shape.
    #[error("Malformed schema document: {0}")]
    Malformed(#[from] serde_yaml::Error),

    /// A parameter declaration is inconsistent.
    #[error("Invalid parameter '{name}' on {method} {route}: {reason}")]
    InvalidParameter {
        route: String,
        method: String,
        name: String,
        reason: String,
    },
}

/// Declared type of a query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    Integer,
    String,
    #[serde(alias = "boolean")]
    Bool,
}

/// One named parameter of a (route, method).
#[derive(Debug, Clone)]
pub struct ParameterSpec {
    pub name: String,
    pub kind: ParameterKind,
    /// Inclusive lower bound, integers only.
    pub minimum: Option<i64>,
    /// Compiled pattern, strings only. Anchored at the start of the value.
    pub pattern: Option<Regex>,
}

/// The parameters declared for one (route, method).
#[derive(Debug, Clone, Default)]
pub struct RouteParameters {
    specs: Vec<ParameterSpec>,
}

impl RouteParameters {
    /// Look up a parameter by name.
    pub fn get(&self, name: &str) -> Option<&ParameterSpec> {
        self.specs.iter().find(|spec| spec.name == name)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Declared parameters in document order.
    pub fn iter(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.specs.iter()
    }
}

/// Route path -> lowercase HTTP method -> parameters.
#[derive(Debug, Clone, Default)]
pub struct ParameterSchema {
    routes: HashMap<String, HashMap<String, RouteParameters>>,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    paths: BTreeMap<String, BTreeMap<String, RawOperation>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawOperation {
    #[serde(default)]
    parameters: Vec<RawParameter>,
}

#[derive(Debug, Deserialize)]
struct RawParameter {
    name: String,
    #[serde(flatten)]
    inline: RawConstraints,
    #[serde(default)]
    schema: Option<RawConstraints>,
}

#[derive(Debug, Default, Deserialize)]
struct RawConstraints {
    #[serde(rename = "type", default)]
    kind: Option<ParameterKind>,
    #[serde(default)]
    minimum: Option<i64>,
    #[serde(default)]
    pattern: Option<String>,
}

impl ParameterSchema {
    /// Read and compile the schema document at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SchemaLoadError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SchemaLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let schema = Self::from_yaml_str(&text)?;
        info!(
            subsystem = "api",
            component = "schema",
            op = "load",
            path = %path.display(),
            routes = schema.routes.len(),
            "Parameter schema loaded"
        );
        Ok(schema)
    }

    /// Compile a schema from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self, SchemaLoadError> {
        let raw: RawDocument = serde_yaml::from_str(text)?;
        let mut routes = HashMap::with_capacity(raw.paths.len());

        for (route, operations) in raw.paths {
            let mut methods = HashMap::with_capacity(operations.len());
            for (method, operation) in operations {
                let method = method.to_lowercase();
                let params = compile_operation(&route, &method, operation)?;
                debug!(route = %route, method = %method, parameters = params.len(), "Compiled route parameters");
                methods.insert(method, params);
            }
            routes.insert(route, methods);
        }

        Ok(Self { routes })
    }

    /// Parameters for `(route, method)`.
    ///
    /// `None` means the pair is not registered; a registered pair without
    /// parameters yields `Some` of an empty set.
    pub fn lookup(&self, route: &str, method: &str) -> Option<&RouteParameters> {
        self.routes
            .get(route)
            .and_then(|methods| methods.get(method.to_lowercase().as_str()))
    }

    /// Number of registered routes.
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }
}

fn compile_operation(
    route: &str,
    method: &str,
    operation: RawOperation,
) -> Result<RouteParameters, SchemaLoadError> {
    let mut specs: Vec<ParameterSpec> = Vec::with_capacity(operation.parameters.len());

    for raw in operation.parameters {
        let invalid = |reason: String| SchemaLoadError::InvalidParameter {
            route: route.to_string(),
            method: method.to_string(),
            name: raw.name.clone(),
            reason,
        };

        if specs.iter().any(|spec| spec.name == raw.name) {
            return Err(invalid("declared more than once".to_string()));
        }

        let nested = raw.schema.unwrap_or_default();
        let kind = raw
            .inline
            .kind
            .or(nested.kind)
            .ok_or_else(|| invalid("missing type".to_string()))?;
        let minimum = raw.inline.minimum.or(nested.minimum);
        let pattern = raw.inline.pattern.clone().or(nested.pattern);

        if minimum.is_some() && kind != ParameterKind::Integer {
            return Err(invalid("minimum is only allowed on integer parameters".to_string()));
        }
        if pattern.is_some() && kind != ParameterKind::String {
            return Err(invalid("pattern is only allowed on string parameters".to_string()));
        }

        let pattern = pattern
            .map(|source| {
                Regex::new(&format!("^(?:{source})"))
                    .map_err(|e| invalid(format!("invalid pattern: {e}")))
            })
            .transpose()?;

        specs.push(ParameterSpec {
            name: raw.name,
            kind,
            minimum,
            pattern,
        });
    }

    Ok(RouteParameters { specs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const DOC: &str = r#"
paths:
  /posts:
    get:
      parameters:
        - name: order
          type: string
          pattern: "^(id|url|title|created_at)$"
        - name: limit
          type: integer
          minimum: 1
        - name: descending
          type: bool
  /health:
    GET: {}
"#;

    #[test]
    fn test_lookup_registered_route() {
        let schema = ParameterSchema::from_yaml_str(DOC).unwrap();
        let params = schema.lookup("/posts", "get").unwrap();
        assert_eq!(params.len(), 3);

        let limit = params.get("limit").unwrap();
        assert_eq!(limit.kind, ParameterKind::Integer);
        assert_eq!(limit.minimum, Some(1));
        assert!(params.get("descending").unwrap().pattern.is_none());
    }

    #[test]
    fn test_lookup_is_method_case_insensitive() {
        let schema = ParameterSchema::from_yaml_str(DOC).unwrap();
        assert!(schema.lookup("/posts", "GET").is_some());
        assert!(schema.lookup("/health", "get").is_some());
    }

    #[test]
    fn test_unregistered_distinct_from_empty() {
        let schema = ParameterSchema::from_yaml_str(DOC).unwrap();
        let health = schema.lookup("/health", "get").unwrap();
        assert!(health.is_empty());

        assert!(schema.lookup("/missing", "get").is_none());
        assert!(schema.lookup("/posts", "post").is_none());
    }

    #[test]
    fn test_parameter_order_is_document_order() {
        let schema = ParameterSchema::from_yaml_str(DOC).unwrap();
        let names: Vec<_> = schema
            .lookup("/posts", "get")
            .unwrap()
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, ["order", "limit", "descending"]);
    }

    #[test]
    fn test_nested_schema_block() {
        let doc = r#"
paths:
  /posts:
    get:
      parameters:
        - name: offset
          in: query
          schema:
            type: integer
            minimum: 0
"#;
        let schema = ParameterSchema::from_yaml_str(doc).unwrap();
        let offset = schema.lookup("/posts", "get").unwrap().get("offset").unwrap();
        assert_eq!(offset.kind, ParameterKind::Integer);
        assert_eq!(offset.minimum, Some(0));
    }

    #[test]
    fn test_boolean_alias() {
        let doc = "paths:\n  /x:\n    get:\n      parameters:\n        - name: flag\n          type: boolean\n";
        let schema = ParameterSchema::from_yaml_str(doc).unwrap();
        let flag = schema.lookup("/x", "get").unwrap().get("flag").unwrap();
        assert_eq!(flag.kind, ParameterKind::Bool);
    }

    #[test]
    fn test_pattern_is_anchored_at_start() {
        let doc = "paths:\n  /x:\n    get:\n      parameters:\n        - name: s\n          type: string\n          pattern: \"ab\"\n";
        let schema = ParameterSchema::from_yaml_str(doc).unwrap();
        let re = schema
            .lookup("/x", "get")
            .unwrap()
            .get("s")
            .unwrap()
            .pattern
            .clone()
            .unwrap();
        assert!(re.is_match("abc"));
        assert!(!re.is_match("cab"));
    }

    #[test]
    fn test_rejects_unknown_type() {
        let doc = "paths:\n  /x:\n    get:\n      parameters:\n        - name: n\n          type: float\n";
        assert!(matches!(
            ParameterSchema::from_yaml_str(doc),
            Err(SchemaLoadError::Malformed(_))
        ));
    }

    #[test]
    fn test_rejects_missing_type() {
        let doc = "paths:\n  /x:\n    get:\n      parameters:\n        - name: n\n";
        assert!(matches!(
            ParameterSchema::from_yaml_str(doc),
            Err(SchemaLoadError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_rejects_minimum_on_string() {
        let doc = "paths:\n  /x:\n    get:\n      parameters:\n        - name: s\n          type: string\n          minimum: 3\n";
        match ParameterSchema::from_yaml_str(doc) {
            Err(SchemaLoadError::InvalidParameter { name, reason, .. }) => {
                assert_eq!(name, "s");
                assert!(reason.contains("minimum"));
            }
            other => panic!("expected InvalidParameter, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_pattern_on_integer() {
        let doc = "paths:\n  /x:\n    get:\n      parameters:\n        - name: n\n          type: integer\n          pattern: \"[0-9]+\"\n";
        assert!(matches!(
            ParameterSchema::from_yaml_str(doc),
            Err(SchemaLoadError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_rejects_invalid_regex() {
        let doc = "paths:\n  /x:\n    get:\n      parameters:\n        - name: s\n          type: string\n          pattern: \"(unclosed\"\n";
        assert!(matches!(
            ParameterSchema::from_yaml_str(doc),
            Err(SchemaLoadError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_rejects_duplicate_parameter() {
        let doc = "paths:\n  /x:\n    get:\n      parameters:\n        - name: n\n          type: integer\n        - name: n\n          type: string\n";
        assert!(matches!(
            ParameterSchema::from_yaml_str(doc),
            Err(SchemaLoadError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_rejects_missing_paths() {
        assert!(matches!(
            ParameterSchema::from_yaml_str("routes: {}\n"),
            Err(SchemaLoadError::Malformed(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ParameterSchema::load("/definitely/not/here/api.yaml").unwrap_err();
        assert!(matches!(err, SchemaLoadError::Read { .. }));
        assert!(err.to_string().contains("/definitely/not/here/api.yaml"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DOC.as_bytes()).unwrap();
        let schema = ParameterSchema::load(file.path()).unwrap();
        assert_eq!(schema.route_count(), 2);
    }
}
