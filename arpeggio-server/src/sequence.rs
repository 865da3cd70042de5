//! Sequence execution engine
//!
//! A sequence is a declared, ordered list of routed commands sharing one
//! templated context. Declaration order is execution order; the context is
//! built once up front and step results do not feed back into it.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use arpeggio_protocol::Kwargs;
use arpeggio_utils::{ArpeggioError, Result};

use crate::config::SequenceConfig;
use crate::router::{value_to_string, Router};
use crate::template;

/// Argument spec of one sequence step
#[derive(Debug, Clone)]
pub enum StepArgs {
    /// Substituted against the context, then whitespace-tokenized into
    /// positional arguments
    Template(String),
    /// Used verbatim as positional arguments, no substitution
    Positional(Vec<Value>),
    /// Used verbatim as named arguments, no substitution
    Named(Kwargs),
}

impl StepArgs {
    fn from_yaml(sequence: &str, path: &str, value: &serde_yaml::Value) -> Result<Self> {
        match value {
            serde_yaml::Value::String(text) => Ok(Self::Template(text.clone())),
            serde_yaml::Value::Sequence(items) => {
                let args = items
                    .iter()
                    .map(yaml_to_json)
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self::Positional(args))
            }
            serde_yaml::Value::Mapping(entries) => {
                let mut kwargs = Kwargs::new();
                for (key, value) in entries {
                    kwargs.insert(yaml_key(key, sequence)?, yaml_to_json(value)?);
                }
                Ok(Self::Named(kwargs))
            }
            other => Err(ArpeggioError::config(format!(
                "sequence {}: step {}: arguments must be a string, list, or mapping, got {:?}",
                sequence, path, other
            ))),
        }
    }

    /// Evaluate into positional and named arguments against the context
    pub fn evaluate(&self, context: &BTreeMap<String, String>) -> Result<(Vec<Value>, Kwargs)> {
        match self {
            Self::Template(text) => {
                let rendered = template::substitute(text, context)?;
                let args = rendered
                    .split_whitespace()
                    .map(|token| Value::String(token.to_string()))
                    .collect();
                Ok((args, Kwargs::new()))
            }
            Self::Positional(args) => Ok((args.clone(), Kwargs::new())),
            Self::Named(kwargs) => Ok((Vec::new(), kwargs.clone())),
        }
    }
}

/// A compiled sequence: context defaults plus ordered steps
#[derive(Debug, Clone)]
pub struct SequenceSpec {
    pub name: String,
    /// Declared context; order defines the positional override slots
    pub context: Vec<(String, String)>,
    /// Steps in declaration order: command path -> argument spec
    pub steps: Vec<(String, StepArgs)>,
}

impl SequenceSpec {
    /// Compile the raw YAML mappings, preserving declaration order
    pub fn from_config(name: &str, config: &SequenceConfig) -> Result<Self> {
        let mut context = Vec::new();
        for (key, value) in &config.context {
            let key = yaml_key(key, name)?;
            let value = value_to_string(&yaml_to_json(value)?);
            context.push((key, value));
        }

        let mut steps = Vec::new();
        for (key, value) in &config.sequence {
            let path = yaml_key(key, name)?;
            let args = StepArgs::from_yaml(name, &path, value)?;
            steps.push((path, args));
        }

        Ok(Self {
            name: name.to_string(),
            context,
            steps,
        })
    }

    /// Declared context keys, in order (the positional override slots)
    pub fn context_keys(&self) -> Vec<String> {
        self.context.iter().map(|(key, _)| key.clone()).collect()
    }
}

impl Router {
    /// Run a declared sequence as one unit
    ///
    /// Context build order (later sources win): the router's live context,
    /// the sequence's declared context, positional overrides zipped onto
    /// the declared keys, named overrides. Steps execute strictly in
    /// declaration order; the first failure aborts the run and discards
    /// the partial report.
    pub async fn run_sequence(
        &mut self,
        spec: &SequenceSpec,
        args: Vec<Value>,
        kwargs: Kwargs,
    ) -> Result<serde_json::Map<String, Value>> {
        let mut context = self.context().clone();
        for (key, value) in &spec.context {
            context.insert(key.clone(), value.clone());
        }
        for ((key, _), value) in spec.context.iter().zip(args.iter()) {
            context.insert(key.clone(), value_to_string(value));
        }
        for (key, value) in &kwargs {
            context.insert(key.clone(), value_to_string(value));
        }

        let mut report = serde_json::Map::new();
        for (path, step) in &spec.steps {
            let (step_args, step_kwargs) = step.evaluate(&context)?;
            debug!(sequence = %spec.name, step = %path, "running step");
            let value = Box::pin(self.dispatch(path, step_args, step_kwargs)).await?;
            report.insert(path.clone(), value.unwrap_or(Value::Null));
        }

        Ok(report)
    }
}

fn yaml_key(value: &serde_yaml::Value, sequence: &str) -> Result<String> {
    value
        .as_str()
        .map(String::from)
        .ok_or_else(|| {
            ArpeggioError::config(format!(
                "sequence {}: mapping keys must be strings, got {:?}",
                sequence, value
            ))
        })
}

/// Convert a YAML value into its JSON equivalent
fn yaml_to_json(value: &serde_yaml::Value) -> Result<Value> {
    match value {
        serde_yaml::Value::Null => Ok(Value::Null),
        serde_yaml::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::from(i))
            } else if let Some(u) = n.as_u64() {
                Ok(Value::from(u))
            } else if let Some(f) = n.as_f64() {
                serde_json::Number::from_f64(f)
                    .map(Value::Number)
                    .ok_or_else(|| ArpeggioError::config(format!("invalid number: {}", f)))
            } else {
                Err(ArpeggioError::config(format!("invalid number: {:?}", n)))
            }
        }
        serde_yaml::Value::String(s) => Ok(Value::String(s.clone())),
        serde_yaml::Value::Sequence(items) => {
            let array = items.iter().map(yaml_to_json).collect::<Result<Vec<_>>>()?;
            Ok(Value::Array(array))
        }
        serde_yaml::Value::Mapping(entries) => {
            let mut object = serde_json::Map::new();
            for (key, value) in entries {
                let key = key.as_str().ok_or_else(|| {
                    ArpeggioError::config(format!("mapping keys must be strings, got {:?}", key))
                })?;
                object.insert(key.to_string(), yaml_to_json(value)?);
            }
            Ok(Value::Object(object))
        }
        serde_yaml::Value::Tagged(tagged) => Err(ArpeggioError::config(format!(
            "unsupported YAML tag: {:?}",
            tagged.tag
        ))),
    }
}
