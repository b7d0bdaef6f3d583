//! Catalog keys: the identity of one logical, versioned dataset.
//!
//! A [`CatalogKey`] names the dataset by namespace, object definition, format
//! (usage, file type, version) and partition values. Every registered data version
//! hangs off exactly one key. Keys are compared field by field, case-sensitively,
//! and an absent sub-partition value is distinct from a present one.
//!
//! Keys arrive from callers as structured records and may carry padding; use
//! [`CatalogKey::normalized`] to obtain the trimmed, validated form.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Maximum number of sub-partition values after the primary partition value.
pub const MAX_SUB_PARTITION_VALUES: usize = 4;

/// Identity of a logical dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogKey {
    /// Namespace owning the object definition.
    pub namespace: String,
    /// Object definition name within the namespace.
    pub object_definition_name: String,
    /// Format usage (e.g. `PRC`, `SRC`).
    pub format_usage: String,
    /// Format file type (e.g. `TXT`, `PARQUET`).
    pub format_file_type: String,
    /// Format version. Signed on the wire; must be `>= 0`.
    pub format_version: i32,
    /// Name of the primary partition column.
    pub partition_key: String,
    /// Primary partition value.
    pub partition_value: String,
    /// Ordered sub-partition values (at most [`MAX_SUB_PARTITION_VALUES`]).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_partition_values: Vec<String>,
}

impl CatalogKey {
    /// Creates a key without sub-partition values.
    #[must_use]
    pub fn new(
        namespace: impl Into<String>,
        object_definition_name: impl Into<String>,
        format_usage: impl Into<String>,
        format_file_type: impl Into<String>,
        format_version: i32,
        partition_key: impl Into<String>,
        partition_value: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            object_definition_name: object_definition_name.into(),
            format_usage: format_usage.into(),
            format_file_type: format_file_type.into(),
            format_version,
            partition_key: partition_key.into(),
            partition_value: partition_value.into(),
            sub_partition_values: Vec::new(),
        }
    }

    /// Returns the key with the given sub-partition values.
    #[must_use]
    pub fn with_sub_partition_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sub_partition_values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Returns a trimmed copy of the key after validating it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the first missing or blank field.
    pub fn normalized(&self) -> Result<Self> {
        let key = Self {
            namespace: self.namespace.trim().to_string(),
            object_definition_name: self.object_definition_name.trim().to_string(),
            format_usage: self.format_usage.trim().to_string(),
            format_file_type: self.format_file_type.trim().to_string(),
            format_version: self.format_version,
            partition_key: self.partition_key.trim().to_string(),
            partition_value: self.partition_value.trim().to_string(),
            sub_partition_values: self
                .sub_partition_values
                .iter()
                .map(|v| v.trim().to_string())
                .collect(),
        };
        key.validate()?;
        Ok(key)
    }

    /// Validates that all required fields are present and non-blank.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the first missing or blank field.
    pub fn validate(&self) -> Result<()> {
        require(&self.namespace, "namespace", "The namespace is required")?;
        require(
            &self.object_definition_name,
            "object_definition_name",
            "The object definition name is required",
        )?;
        require(&self.format_usage, "format_usage", "The format usage is required")?;
        require(
            &self.format_file_type,
            "format_file_type",
            "The format file type is required",
        )?;
        if self.format_version < 0 {
            return Err(Error::validation(
                "format_version",
                "The format version must be greater than or equal to 0",
            ));
        }
        require(
            &self.partition_value,
            "partition_value",
            "The partition value is required",
        )?;
        if self.sub_partition_values.len() > MAX_SUB_PARTITION_VALUES {
            return Err(Error::validation(
                "sub_partition_values",
                format!("At most {MAX_SUB_PARTITION_VALUES} sub-partition values are allowed"),
            ));
        }
        for (i, value) in self.sub_partition_values.iter().enumerate() {
            if value.trim().is_empty() {
                return Err(Error::validation(
                    "sub_partition_values",
                    format!("The sub-partition value [{i}] must not be blank"),
                ));
            }
        }
        Ok(())
    }

    /// Returns the format this key's data is stored in.
    #[must_use]
    pub fn format_key(&self) -> FormatKey {
        FormatKey {
            namespace: self.namespace.clone(),
            object_definition_name: self.object_definition_name.clone(),
            format_usage: self.format_usage.clone(),
            format_file_type: self.format_file_type.clone(),
            format_version: self.format_version,
        }
    }

    /// Iterates over all partition values, primary first.
    pub fn partition_values(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.partition_value.as_str())
            .chain(self.sub_partition_values.iter().map(String::as_str))
    }
}

impl std::fmt::Display for CatalogKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}:{}",
            self.namespace,
            self.object_definition_name,
            self.format_usage,
            self.format_file_type,
            self.format_version,
            self.partition_value
        )?;
        for value in &self.sub_partition_values {
            write!(f, "|{value}")?;
        }
        Ok(())
    }
}

/// Identity of an object format: a catalog key without partition values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatKey {
    /// Namespace owning the object definition.
    pub namespace: String,
    /// Object definition name within the namespace.
    pub object_definition_name: String,
    /// Format usage.
    pub format_usage: String,
    /// Format file type.
    pub format_file_type: String,
    /// Format version.
    pub format_version: i32,
}

impl std::fmt::Display for FormatKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "namespace \"{}\", object definition name \"{}\", format usage \"{}\", format file type \"{}\", and format version \"{}\"",
            self.namespace,
            self.object_definition_name,
            self.format_usage,
            self.format_file_type,
            self.format_version
        )
    }
}

fn require(value: &str, field: &'static str, message: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(Error::validation(field, message))
    } else {
        Ok(())
    }
}
