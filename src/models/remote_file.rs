use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Envelope returned by the file backend's listing endpoint.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct FileListing {
    #[serde(default, deserialize_with = "truthy")]
    pub success: bool,
    #[serde(default)]
    pub count: Option<usize>,
    #[serde(default)]
    pub files: Vec<RemoteFile>,
}

/// One entry in the backend listing. Only `direct_link` drives the pipeline.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    pub direct_link: String,
    #[serde(default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Read `success` the way a loose JSON client would: `null`, `0`, `""`,
/// `[]` and `{}` are false, other non-bool values are true.
fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    })
}

impl FileListing {
    /// Direct links in listing order, or nothing when the backend reports failure.
    pub fn into_direct_links(self) -> Vec<String> {
        if !self.success {
            return Vec::new();
        }
        self.files.into_iter().map(|f| f.direct_link).collect()
    }
}
