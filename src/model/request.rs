//! Read requests given as loosely typed JSON,
//! as they come from configuration files or the command line.
use std::path::PathBuf;

use serde_json::{Map, Value};
use snafu::OptionExt;

use super::defer::{json_type_name, DeferSize};
use super::loader::{read_file, ReadDataset, ReadOptions};
use crate::error::{MissingArgumentSnafu, ReadError, WrongTypeSnafu};
use crate::utils::parse_tag;

/// A file to read and how to read it.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadRequest {
    pub path: PathBuf,
    pub options: ReadOptions,
}

impl ReadRequest {
    pub fn new(path: impl Into<PathBuf>, options: ReadOptions) -> Self {
        ReadRequest {
            path: path.into(),
            options,
        }
    }

    /// Validate a request such as
    ///
    /// ```json
    /// { "path": "ttfm.dcm", "defer_size": "2 KB", "stop_before_pixels": true,
    ///   "force": false, "specific_tags": ["PatientName", "(0020,0037)"] }
    /// ```
    ///
    /// `path` is required and must be a string.
    pub fn from_json(value: &Value) -> Result<Self, ReadError> {
        let request = match value {
            Value::Object(map) => map,
            other => {
                return WrongTypeSnafu {
                    argument: "request",
                    expected: "an object",
                    found: json_type_name(other),
                }
                .fail()
            }
        };

        let path = match request.get("path").context(MissingArgumentSnafu { argument: "path" })? {
            Value::String(path) => PathBuf::from(path),
            other => {
                return WrongTypeSnafu {
                    argument: "path",
                    expected: "a path string",
                    found: json_type_name(other),
                }
                .fail()
            }
        };

        let defer_size = match request.get("defer_size") {
            Some(value) => DeferSize::from_json(value)?,
            None => DeferSize::Never,
        };

        let mut options = ReadOptions::new()
            .defer_size(defer_size)
            .stop_before_pixels(flag(request, "stop_before_pixels")?)
            .force(flag(request, "force")?);

        match request.get("specific_tags") {
            None | Some(Value::Null) => {}
            Some(Value::Array(items)) => {
                let mut tags = Vec::with_capacity(items.len());
                for item in items {
                    let Value::String(text) = item else {
                        return WrongTypeSnafu {
                            argument: "specific_tags",
                            expected: "a list of tag strings",
                            found: json_type_name(item),
                        }
                        .fail();
                    };
                    tags.push(parse_tag(text)?);
                }
                options = options.specific_tags(tags);
            }
            Some(other) => {
                return WrongTypeSnafu {
                    argument: "specific_tags",
                    expected: "a list of tag strings",
                    found: json_type_name(other),
                }
                .fail()
            }
        }

        Ok(ReadRequest { path, options })
    }

    pub fn read(&self) -> Result<ReadDataset, ReadError> {
        read_file(&self.path, &self.options)
    }
}

fn flag(request: &Map<String, Value>, name: &'static str) -> Result<bool, ReadError> {
    match request.get(name) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(value)) => Ok(*value),
        Some(other) => WrongTypeSnafu {
            argument: name,
            expected: "a boolean",
            found: json_type_name(other),
        }
        .fail(),
    }
}
