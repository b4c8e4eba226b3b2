use crate::files::FileReader;
use crate::ContentResult;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

/// One entry of `Config/compliant_policies.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CompliantPolicy {
    pub name: String,
    pub description: Option<String>,
    /// Argument names that only make sense under this policy.
    pub arguments: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompliantPolicies {
    policies: Vec<CompliantPolicy>,
}

impl CompliantPolicies {
    pub fn new(policies: Vec<CompliantPolicy>) -> Self {
        Self { policies }
    }

    /// Accepts either a bare list or `{"policies": [...]}`.
    pub fn from_value(value: &Value) -> ContentResult<Self> {
        let list = match value {
            Value::Object(map) => map.get("policies").cloned().unwrap_or(Value::Array(Vec::new())),
            other => other.clone(),
        };
        Ok(Self::new(serde_json::from_value(list)?))
    }

    pub fn load(reader: &FileReader, path: &Path) -> ContentResult<Option<Self>> {
        if !reader.resolve(path).is_file() {
            return Ok(None);
        }
        let value = reader.read_value(path)?;
        Self::from_value(&value).map(Some)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.policies.iter().any(|policy| policy.name == name)
    }

    /// Policies naming `argument` among their arguments.
    pub fn policies_for_argument(&self, argument: &str) -> Vec<&str> {
        self.policies
            .iter()
            .filter(|policy| policy.arguments.iter().any(|name| name == argument))
            .map(|policy| policy.name.as_str())
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.policies.iter().map(|policy| policy.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn both_layouts_are_accepted() {
        let listed = CompliantPolicies::from_value(&json!([{"name": "PII", "arguments": ["email"]}])).expect("list");
        let wrapped = CompliantPolicies::from_value(&json!({"policies": [{"name": "PII", "arguments": ["email"]}]}))
            .expect("wrapped");
        assert_eq!(listed, wrapped);
        assert!(listed.contains("PII"));
        assert_eq!(listed.policies_for_argument("email"), vec!["PII"]);
        assert!(listed.policies_for_argument("limit").is_empty());
    }
}
