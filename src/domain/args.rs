// ============================================================
// Domain — Args (configuration bags)
// ============================================================
// Every node and every exec is configured from a plain map of
// values. Configuration files are written for humans, so keys
// may contain spaces ("batch size", "is root"); they are
// normalised to snake_case-ish identifiers once, here, so the
// rest of the crate only ever sees `batch_size`, `is_root`.
//
// A node section may be given in three shapes:
//
//   "optimizer": "Adam"
//   "optimizer": { "name": "Adam", "args": { "learning rate": 1e-3 } }
//   "optimizer": { "name": "Adam", "learning rate": 1e-3 }

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ExecError, Result};

/// Replace spaces with underscores: `"batch size"` → `"batch_size"`.
pub fn normalize_key(key: &str) -> String {
    key.trim().replace(' ', "_")
}

fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (normalize_key(&k), normalize(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        other => other,
    }
}

/// A configuration dictionary with normalised keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Args(Map<String, Value>);

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON value. `null` yields an empty bag.
    pub fn from_value(value: Value) -> Result<Self> {
        match normalize(value) {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            other => Err(ExecError::invalid(
                "<root>",
                format!("expected an object, found {other}"),
            )),
        }
    }

    /// Load a `.json`, `.yaml` or `.yml` configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;

        let value: Value = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&text)?,
            _ => serde_json::from_str(&text)?,
        };

        tracing::debug!("Loaded configuration from '{}'", path.display());
        Self::from_value(value)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(normalize_key(key), normalize(value.into()));
    }

    /// Apply a `key=value` override as given on the command line.
    ///
    /// The value is parsed as JSON when it can be (`3`, `true`, `[16, 8]`)
    /// and kept as a string otherwise. Dotted keys reach into nested
    /// sections: `optimizer.args.learning rate=0.01`. A node given in the
    /// shorthand form (`"optimizer": "Adam"`) is expanded to
    /// `{"name": "Adam"}` before descending into it. Any other value on
    /// the way down is an error.
    pub fn set_override(&mut self, expr: &str) -> Result<()> {
        let (key, raw) = expr
            .split_once('=')
            .ok_or_else(|| ExecError::invalid(expr, "expected 'key=value'"))?;
        let value = serde_json::from_str::<Value>(raw.trim())
            .unwrap_or_else(|_| Value::String(raw.trim().to_string()));

        let path: Vec<String> = key.split('.').map(normalize_key).collect();
        if path.iter().any(String::is_empty) {
            return Err(ExecError::invalid(key, "empty key segment"));
        }

        let Some((last, parents)) = path.split_last() else {
            return Err(ExecError::invalid(key, "empty key"));
        };
        let mut cursor = &mut self.0;
        for (depth, segment) in parents.iter().enumerate() {
            let entry = cursor
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            // node shorthand only exists at the top level
            match entry {
                Value::String(name) if depth == 0 => {
                    let mut expanded = Map::new();
                    expanded.insert("name".to_string(), Value::String(name.clone()));
                    *entry = Value::Object(expanded);
                }
                _ => {}
            }
            cursor = match entry {
                Value::Object(map) => map,
                other => {
                    return Err(ExecError::invalid(key, format!("'{segment}' is {other}, not a section")))
                }
            };
        }
        cursor.insert(last.clone(), normalize(value));
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(&normalize_key(key))
    }

    /// Typed lookup of a required key.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let key = normalize_key(key);
        let value = self.0.get(&key).ok_or_else(|| ExecError::missing(&key))?;
        serde_json::from_value(value.clone()).map_err(|e| ExecError::invalid(key, e))
    }

    /// Typed lookup of an optional key.
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T> {
        if self.contains(key) {
            self.get(key)
        } else {
            Ok(default)
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// The `env` section, or the single-process defaults.
    pub fn env(&self) -> Result<Env> {
        self.get_or("env", Env::default())
    }

    /// A node section (`data`, `model`, `loss`, `optimizer`).
    pub fn node(&self, key: &str) -> Result<NodeArgs> {
        let key = normalize_key(key);
        match self.0.get(&key) {
            None => Err(ExecError::missing(key)),
            Some(Value::String(name)) => Ok(NodeArgs {
                name: name.clone(),
                args: Args::default(),
            }),
            Some(Value::Object(map)) => {
                let name = map
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ExecError::missing(format!("{key}.name")))?
                    .to_string();

                let args = match map.get("args") {
                    Some(args) => Args::from_value(args.clone())?,
                    None => Args(
                        map.iter()
                            .filter(|(k, _)| k.as_str() != "name")
                            .map(|(k, v)| (k.clone(), v.clone()))
                            .collect(),
                    ),
                };
                Ok(NodeArgs { name, args })
            }
            Some(other) => Err(ExecError::invalid(
                key,
                format!("expected a node name or object, found {other}"),
            )),
        }
    }
}

/// A node section resolved into its name and its own arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeArgs {
    pub name: String,
    pub args: Args,
}

/// Where and how this exec runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Env {
    pub id: u64,
    pub machine: String,
    pub is_root: bool,
    pub is_distributed: bool,
}

impl Default for Env {
    fn default() -> Self {
        Self {
            id: 0,
            machine: "cpu".to_string(),
            is_root: true,
            is_distributed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Args {
        Args::from_value(json!({
            "epoch": 2,
            "batch size": 16,
            "env": { "id": 3, "machine": "cuda:0", "is root": false },
            "optimizer": "Adam",
            "model": { "name": "IrisNet", "args": { "hidden layers": [8] } },
            "loss": { "name": "Mse", "reduction": "mean" },
        }))
        .unwrap()
    }

    #[test]
    fn test_keys_are_normalized() {
        let args = sample();
        assert_eq!(args.get::<usize>("batch_size").unwrap(), 16);
        assert_eq!(args.get::<usize>("batch size").unwrap(), 16);
        let env = args.env().unwrap();
        assert_eq!(env.id, 3);
        assert!(!env.is_root);
        assert!(!env.is_distributed);
        assert_eq!(env.machine, "cuda:0");
    }

    #[test]
    fn test_missing_and_invalid_keys() {
        let args = sample();
        assert!(matches!(
            args.get::<usize>("learning_rate"),
            Err(ExecError::MissingKey { key }) if key == "learning_rate"
        ));
        assert!(matches!(
            args.get::<bool>("epoch"),
            Err(ExecError::InvalidValue { .. })
        ));
        assert_eq!(args.get_or("seed", 7u64).unwrap(), 7);
    }

    #[test]
    fn test_node_forms() {
        let args = sample();

        let optim = args.node("optimizer").unwrap();
        assert_eq!(optim.name, "Adam");
        assert!(optim.args.keys().next().is_none());

        let model = args.node("model").unwrap();
        assert_eq!(model.name, "IrisNet");
        assert_eq!(model.args.get::<Vec<usize>>("hidden_layers").unwrap(), vec![8]);

        let loss = args.node("loss").unwrap();
        assert_eq!(loss.name, "Mse");
        assert_eq!(loss.args.get::<String>("reduction").unwrap(), "mean");

        assert!(matches!(args.node("data"), Err(ExecError::MissingKey { .. })));
    }

    #[test]
    fn test_overrides() {
        let mut args = sample();
        args.set_override("epoch=5").unwrap();
        args.set_override("env.machine=cpu").unwrap();
        args.set_override("optimizer.args.learning rate=0.5").unwrap();
        args.set_override("tag=baseline").unwrap();

        assert_eq!(args.get::<usize>("epoch").unwrap(), 5);
        assert_eq!(args.env().unwrap().machine, "cpu");
        assert_eq!(args.get::<String>("tag").unwrap(), "baseline");

        let optim = args.node("optimizer").unwrap();
        assert_eq!(optim.name, "Adam");
        assert_eq!(optim.args.get::<f64>("learning_rate").unwrap(), 0.5);

        assert!(args.set_override("no-equals-sign").is_err());
    }

    #[test]
    fn test_override_cannot_descend_into_a_value() {
        let mut args = sample();
        assert!(matches!(
            args.set_override("epoch.x=1"),
            Err(ExecError::InvalidValue { .. })
        ));
        assert!(matches!(
            args.set_override("model.args.hidden_layers.x=1"),
            Err(ExecError::InvalidValue { .. })
        ));
        assert!(args.set_override("optimizer.name.x=1").is_err());
        assert_eq!(args.get::<usize>("epoch").unwrap(), 2);
        assert_eq!(args.node("optimizer").unwrap().name, "Adam");
        assert_eq!(args.node("model").unwrap().args.get::<Vec<usize>>("hidden_layers").unwrap(), vec![8]);

        // Missing sections are still created on the way down.
        args.set_override("scheduler.args.step=3").unwrap();
        assert_eq!(args.get::<Value>("scheduler").unwrap(), json!({ "args": { "step": 3 } }));
    }

    #[test]
    fn test_env_defaults() {
        let env = Args::new().env().unwrap();
        assert_eq!(env, Env::default());
        assert!(env.is_root);
    }

    #[test]
    fn test_load_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exec.yaml");
        fs::write(&path, "epoch: 1\nbatch size: 4\ndata: Blobs\n").unwrap();

        let args = Args::load(&path).unwrap();
        assert_eq!(args.get::<usize>("batch_size").unwrap(), 4);
        assert_eq!(args.node("data").unwrap().name, "Blobs");
    }
}
