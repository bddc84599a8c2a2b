//! Declarative field contracts for extraction.
//!
//! An [`ExtractionSchema`] is used twice per call: its worked example is
//! rendered into the system prompt, and the model's JSON answer is checked
//! against it field by field. Schemas are either predeclared (see
//! [`presets`]) or synthesized at call time from a field/type mapping with
//! [`ExtractionSchema::from_field_types`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    Array { items: Box<FieldType> },
    Object { fields: Vec<FieldSpec> },
    Any,
}

impl FieldType {
    pub fn array_of(items: FieldType) -> Self {
        FieldType::Array {
            items: Box::new(items),
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Array { .. } => value.is_array(),
            FieldType::Object { .. } => value.is_object(),
            FieldType::Any => true,
        }
    }

    fn placeholder(&self, name: &str) -> Value {
        match self {
            FieldType::String => Value::String(format!("<{name}>")),
            FieldType::Integer => json!(0),
            FieldType::Number => json!(0.0),
            FieldType::Boolean => json!(false),
            FieldType::Array { items } => json!([items.placeholder(name)]),
            FieldType::Object { fields } => render_example(fields),
            FieldType::Any => json!(format!("<{name}>")),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::String => f.write_str("string"),
            FieldType::Integer => f.write_str("integer"),
            FieldType::Number => f.write_str("number"),
            FieldType::Boolean => f.write_str("boolean"),
            FieldType::Array { items } => write!(f, "list[{items}]"),
            FieldType::Object { .. } => f.write_str("object"),
            FieldType::Any => f.write_str("any"),
        }
    }
}

/// Parses the short type names accepted on the command line and in config:
/// `str`, `int`, `float`, `bool`, `any`, `list[<type>]` and their long forms.
impl FromStr for FieldType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim().to_ascii_lowercase();
        if let Some(inner) = raw
            .strip_prefix("list[")
            .or_else(|| raw.strip_prefix("array["))
            .and_then(|rest| rest.strip_suffix(']'))
        {
            return Ok(FieldType::array_of(inner.parse()?));
        }
        match raw.as_str() {
            "str" | "string" | "text" => Ok(FieldType::String),
            "int" | "integer" => Ok(FieldType::Integer),
            "float" | "number" => Ok(FieldType::Number),
            "bool" | "boolean" => Ok(FieldType::Boolean),
            "list" | "array" => Ok(FieldType::array_of(FieldType::Any)),
            "any" | "object" | "dict" => Ok(FieldType::Any),
            _ => Err(SchemaError::UnknownType(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(flatten)]
    pub ty: FieldType,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            description: String::new(),
            example: None,
            required: true,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn example(mut self, example: Value) -> Self {
        self.example = Some(example);
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    fn example_value(&self) -> Value {
        self.example
            .clone()
            .unwrap_or_else(|| self.ty.placeholder(&self.name))
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SchemaError {
    #[error("schema has no fields")]
    Empty,
    #[error("duplicate field: {0}")]
    DuplicateField(String),
    #[error("invalid field name: {0:?}")]
    InvalidFieldName(String),
    #[error("unknown field type: {0}")]
    UnknownType(String),
}

/// Mismatch between a model answer and the schema.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SchemaValidationError {
    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("missing required field `{path}`")]
    MissingField { path: String },
    #[error("field `{path}` should be {expected}, found {found}")]
    TypeMismatch {
        path: String,
        expected: String,
        found: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionSchema {
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

impl ExtractionSchema {
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Synthesize a schema from an ad hoc field-name → type mapping.
    ///
    /// The caller's fields describe one extracted item; the resulting
    /// contract wraps them as `{ index, name, data: [ {fields…} ] }` so a page
    /// listing many items fits the same shape.
    ///
    /// ```
    /// use structify_llm::schema::{ExtractionSchema, FieldType};
    ///
    /// let schema = ExtractionSchema::from_field_types(
    ///     "products",
    ///     [("title", FieldType::String), ("price", FieldType::Number)],
    /// )
    /// .unwrap();
    /// let ok = serde_json::json!({
    ///     "index": 0,
    ///     "name": "products",
    ///     "data": [{"title": "Lamp", "price": 12.5}]
    /// });
    /// assert!(schema.validate(&ok).is_ok());
    /// ```
    pub fn from_field_types<I, S>(name: &str, mapping: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = (S, FieldType)>,
        S: Into<String>,
    {
        let item_fields = mapping
            .into_iter()
            .map(|(field, ty)| FieldSpec::new(field, ty))
            .collect::<Vec<_>>();
        if item_fields.is_empty() {
            return Err(SchemaError::Empty);
        }
        check_field_names(&item_fields)?;

        Self::builder(name)
            .field(FieldSpec::new("index", FieldType::Integer).describe("Index of the item"))
            .field(FieldSpec::new("name", FieldType::String).describe("Name of the item"))
            .field(
                FieldSpec::new(
                    "data",
                    FieldType::array_of(FieldType::Object {
                        fields: item_fields,
                    }),
                )
                .describe("The dynamic data fields"),
            )
            .build()
    }

    /// Worked example rendered into the prompt.
    pub fn example(&self) -> Value {
        render_example(&self.fields)
    }

    /// Human-readable field list, one `- name (type): description` per line.
    pub fn field_summary(&self) -> String {
        let mut out = String::new();
        summarize(&self.fields, 0, &mut out);
        out
    }

    /// Check a parsed answer against the contract. Unknown extra keys are allowed.
    pub fn validate(&self, value: &Value) -> Result<(), SchemaValidationError> {
        validate_object(&self.fields, value, "$")
    }
}

pub struct SchemaBuilder {
    name: String,
    fields: Vec<FieldSpec>,
}

impl SchemaBuilder {
    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn build(self) -> Result<ExtractionSchema, SchemaError> {
        if self.fields.is_empty() {
            return Err(SchemaError::Empty);
        }
        check_field_names(&self.fields)?;
        Ok(ExtractionSchema {
            name: self.name,
            fields: self.fields,
        })
    }
}

fn check_field_names(fields: &[FieldSpec]) -> Result<(), SchemaError> {
    let mut seen = HashSet::new();
    for field in fields {
        let name = field.name.trim();
        if name.is_empty() || name != field.name {
            return Err(SchemaError::InvalidFieldName(field.name.clone()));
        }
        if !seen.insert(name) {
            return Err(SchemaError::DuplicateField(field.name.clone()));
        }
        if let FieldType::Object { fields } = &field.ty {
            check_field_names(fields)?;
        }
    }
    Ok(())
}

fn render_example(fields: &[FieldSpec]) -> Value {
    let mut map = Map::new();
    for field in fields {
        map.insert(field.name.clone(), field.example_value());
    }
    Value::Object(map)
}

fn summarize(fields: &[FieldSpec], depth: usize, out: &mut String) {
    for field in fields {
        let indent = "  ".repeat(depth);
        let optional = if field.required { "" } else { ", optional" };
        out.push_str(&format!("{indent}- {} ({}{optional})", field.name, field.ty));
        if !field.description.is_empty() {
            out.push_str(&format!(": {}", field.description));
        }
        out.push('\n');
        match &field.ty {
            FieldType::Object { fields } => summarize(fields, depth + 1, out),
            FieldType::Array { items } => {
                if let FieldType::Object { fields } = items.as_ref() {
                    summarize(fields, depth + 1, out);
                }
            }
            _ => {}
        }
    }
}

fn validate_object(
    fields: &[FieldSpec],
    value: &Value,
    path: &str,
) -> Result<(), SchemaValidationError> {
    let obj = value
        .as_object()
        .ok_or_else(|| SchemaValidationError::TypeMismatch {
            path: path.to_string(),
            expected: "object".to_string(),
            found: json_kind(value),
        })?;
    for field in fields {
        let field_path = if path == "$" {
            field.name.clone()
        } else {
            format!("{path}.{}", field.name)
        };
        match obj.get(&field.name) {
            None | Some(Value::Null) if !field.required => {}
            None => return Err(SchemaValidationError::MissingField { path: field_path }),
            Some(v) => validate_value(&field.ty, v, &field_path)?,
        }
    }
    Ok(())
}

fn validate_value(ty: &FieldType, value: &Value, path: &str) -> Result<(), SchemaValidationError> {
    if !ty.matches(value) {
        return Err(SchemaValidationError::TypeMismatch {
            path: path.to_string(),
            expected: ty.to_string(),
            found: json_kind(value),
        });
    }
    match (ty, value) {
        (FieldType::Array { items }, Value::Array(elems)) => {
            for (i, elem) in elems.iter().enumerate() {
                validate_value(items, elem, &format!("{path}[{i}]"))?;
            }
            Ok(())
        }
        (FieldType::Object { fields }, _) => validate_object(fields, value, path),
        _ => Ok(()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Predeclared schemas.
pub mod presets {
    use super::*;

    /// Default contract: a short name for what was extracted plus free-form data.
    pub fn generic() -> ExtractionSchema {
        ExtractionSchema {
            name: "website".to_string(),
            fields: vec![
                FieldSpec::new("name", FieldType::String)
                    .describe("Only the general name of extracted thing")
                    .example(json!("latest_stock_details")),
                FieldSpec::new("data", FieldType::Any)
                    .describe(
                        "The important data to be extracted, if the data is huge then it should be a list of dictionaries",
                    )
                    .example(json!([
                        {"name": "stock_name", "value": "Apple Inc."},
                        {"name": "stock_price", "value": "$150.00"}
                    ])),
            ],
        }
    }

    /// Quote listing pages: every quote with its author and tags.
    pub fn quotes() -> ExtractionSchema {
        let quote = vec![
            FieldSpec::new("text", FieldType::String).example(json!("Some Quotes")),
            FieldSpec::new("author", FieldType::String).example(json!("Some Author")),
            FieldSpec::new("tags", FieldType::array_of(FieldType::String))
                .example(json!(["tag1", "tag2"]))
                .optional(),
        ];
        ExtractionSchema {
            name: "quotes_page".to_string(),
            fields: vec![FieldSpec::new(
                "quotes",
                FieldType::array_of(FieldType::Object { fields: quote }),
            )],
        }
    }

    pub fn by_name(name: &str) -> Option<ExtractionSchema> {
        match name.trim().to_ascii_lowercase().as_str() {
            "generic" | "website" => Some(generic()),
            "quotes" => Some(quotes()),
            _ => None,
        }
    }
}
