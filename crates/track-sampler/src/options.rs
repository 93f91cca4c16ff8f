//! Opaque sampler options forwarded verbatim from the caller

use crate::error::{SamplerError, SamplerResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Key/value options interpreted only by the sampler that receives them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SamplerOptions(BTreeMap<String, Value>);

impl SamplerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Parse a JSON object such as `{"chains": 2, "iter": 500}`
    pub fn from_json(json: &str) -> SamplerResult<Self> {
        match serde_json::from_str::<Value>(json)? {
            Value::Object(map) => Ok(Self(map.into_iter().collect())),
            other => Err(SamplerError::invalid_option(
                "<root>",
                format!("expected a JSON object, got {other}"),
            )),
        }
    }

    /// Non-negative integer option, or `default` when absent
    pub fn get_u64(&self, key: &str, default: u64) -> SamplerResult<u64> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => v
                .as_u64()
                .ok_or_else(|| SamplerError::invalid_option(key, format!("expected a non-negative integer, got {v}"))),
        }
    }

    pub fn get_usize(&self, key: &str, default: usize) -> SamplerResult<usize> {
        let value = self.get_u64(key, default as u64)?;
        usize::try_from(value).map_err(|_| SamplerError::invalid_option(key, "value too large"))
    }

    pub fn get_bool(&self, key: &str, default: bool) -> SamplerResult<bool> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => v
                .as_bool()
                .ok_or_else(|| SamplerError::invalid_option(key, format!("expected a boolean, got {v}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_typed_getters() {
        let opts = SamplerOptions::new().with("chains", 2).with("parallel", false);
        assert_eq!(opts.get_usize("chains", 4).unwrap(), 2);
        assert_eq!(opts.get_usize("iter", 2000).unwrap(), 2000);
        assert!(!opts.get_bool("parallel", true).unwrap());
    }

    #[test]
    fn test_wrong_types_rejected() {
        let opts = SamplerOptions::new().with("chains", "four").with("parallel", 1);
        assert!(matches!(
            opts.get_usize("chains", 4),
            Err(SamplerError::InvalidOption { ref key, .. }) if key == "chains"
        ));
        assert!(opts.get_bool("parallel", true).is_err());
    }

    #[test]
    fn test_from_json() {
        let opts = SamplerOptions::from_json(r#"{"chains": 3, "control": {"adapt": 0.9}}"#).unwrap();
        assert_eq!(opts.len(), 2);
        assert_eq!(opts.get_usize("chains", 4).unwrap(), 3);
        assert!(opts.get("control").unwrap().is_object());

        assert!(SamplerOptions::from_json("[1, 2]").is_err());
        assert!(SamplerOptions::from_json("not json").is_err());
    }
}
