//! Deferred parameter binding
//!
//! [`Params`] registers named parameters and binds values to them later.
//! [`Param`] is the handle returned by [`Params::add`]; it shares its slot
//! with the registry, so a value bound through the registry is visible
//! through every handle previously handed out.
//!
//! ```
//! use nosql_params::{Params, ValueType};
//!
//! let mut params = Params::new();
//! let name = params.add("name").unwrap();
//! assert!(name.get().is_err());
//!
//! params.bind("name", "Ada Lovelace").unwrap();
//! assert_eq!(name.get_as::<String>().unwrap(), "Ada Lovelace");
//! assert!(name.is_instance_of(ValueType::String));
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::config::BindConfig;
use crate::error::ParamError;
use crate::value::{FromValue, Value, ValueType};

/// Binding state of one parameter
#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Unbound,
    Bound(Value),
}

/// Handle to one deferred parameter value
///
/// Cloning is cheap and every clone observes the same slot.
#[derive(Clone)]
pub struct Param {
    name: Arc<str>,
    slot: Arc<RwLock<Slot>>,
}

impl Param {
    fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            slot: Arc::new(RwLock::new(Slot::Unbound)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_bound(&self) -> bool {
        matches!(*self.slot.read(), Slot::Bound(_))
    }

    /// The bound value, or `Unbound` if nothing was bound yet
    pub fn get(&self) -> Result<Value, ParamError> {
        match &*self.slot.read() {
            Slot::Bound(value) => Ok(value.clone()),
            Slot::Unbound => Err(ParamError::unbound(self.name())),
        }
    }

    /// The bound value converted to `T`
    ///
    /// Fails with `Unbound` before binding and `TypeMismatch` when the value
    /// has no conversion to `T`.
    pub fn get_as<T: FromValue>(&self) -> Result<T, ParamError> {
        let value = self.get()?;
        T::from_value(&value).ok_or_else(|| self.mismatch(T::TYPE, &value))
    }

    /// Descriptor form of [`get_as`](Self::get_as)
    pub fn get_typed(&self, target: ValueType) -> Result<Value, ParamError> {
        let value = self.get()?;
        value
            .convert(target)
            .ok_or_else(|| self.mismatch(target, &value))
    }

    /// Whether the current value is an instance of `ty`
    ///
    /// An unbound parameter matches every type. A bound one matches only
    /// the type tag of its value, without conversions.
    pub fn is_instance_of(&self, ty: ValueType) -> bool {
        match &*self.slot.read() {
            Slot::Unbound => true,
            Slot::Bound(value) => value.value_type() == ty,
        }
    }

    fn set(&self, value: Value, allow_rebind: bool) -> Result<(), ParamError> {
        let mut slot = self.slot.write();
        if let Slot::Bound(previous) = &*slot {
            if !allow_rebind {
                return Err(ParamError::AlreadyBound {
                    name: self.name().to_string(),
                });
            }
            debug!(param = %self.name, previous = %previous, value = %value, "rebinding parameter");
        } else {
            debug!(param = %self.name, value = %value, "binding parameter");
        }
        *slot = Slot::Bound(value);
        Ok(())
    }

    fn mismatch(&self, expected: ValueType, found: &Value) -> ParamError {
        ParamError::TypeMismatch {
            name: self.name().to_string(),
            expected,
            found: found.value_type(),
        }
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Param")
            .field("name", &self.name)
            .field("slot", &*self.slot.read())
            .finish()
    }
}

/// Registry of named parameters
#[derive(Debug, Default)]
pub struct Params {
    /// name → shared slot
    entries: FxHashMap<String, Param>,
    config: BindConfig,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: BindConfig) -> Self {
        Self {
            entries: FxHashMap::default(),
            config,
        }
    }

    pub fn config(&self) -> BindConfig {
        self.config
    }

    /// Register `name` and return its handle
    ///
    /// Registering a name twice returns the handle created the first time.
    pub fn add(&mut self, name: &str) -> Result<Param, ParamError> {
        validate_name(name)?;

        if let Some(existing) = self.entries.get(name) {
            debug!(param = name, "parameter already registered");
            return Ok(existing.clone());
        }

        let param = Param::new(name);
        self.entries.insert(name.to_string(), param.clone());
        debug!(param = name, "registered parameter");
        Ok(param)
    }

    /// Every registered name, once each
    pub fn names(&self) -> BTreeSet<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<Param> {
        self.entries.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bind `value` to the parameter registered as `name`
    ///
    /// Takes `&self`: the slot is shared with outstanding handles and
    /// carries its own lock.
    pub fn bind(&self, name: &str, value: impl Into<Value>) -> Result<(), ParamError> {
        let Some(param) = self.entries.get(name) else {
            if self.config.ignore_unknown {
                warn!(param = name, "ignoring bind for unregistered parameter");
                return Ok(());
            }
            return Err(ParamError::NotFound {
                name: name.to_string(),
            });
        };
        param.set(value.into(), self.config.allow_rebind)
    }

    /// Bind every pair, stopping at the first failure
    pub fn bind_all<I, K, V>(&self, bindings: I) -> Result<(), ParamError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (name, value) in bindings {
            self.bind(name.as_ref(), value)?;
        }
        Ok(())
    }

    /// Bind from a JSON object of `name: value`
    pub fn bind_json(&self, bindings: &serde_json::Value) -> Result<(), ParamError> {
        let serde_json::Value::Object(map) = bindings else {
            return Err(ParamError::InvalidBindings {
                details: format!("expected an object, got {}", json_kind(bindings)),
            });
        };
        self.bind_all(map.iter().map(|(k, v)| (k, Value::from(v.clone()))))
    }

    /// Names still waiting for a value, sorted
    pub fn unbound_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .values()
            .filter(|p| !p.is_bound())
            .map(|p| p.name().to_string())
            .collect();
        names.sort();
        names
    }

    pub fn is_fully_bound(&self) -> bool {
        self.entries.values().all(Param::is_bound)
    }

    /// Fail with one `Unbound` error naming every unbound parameter
    pub fn ensure_bound(&self) -> Result<(), ParamError> {
        let names = self.unbound_names();
        if names.is_empty() {
            Ok(())
        } else {
            Err(ParamError::Unbound { names })
        }
    }

    /// Snapshot of bound values (unbound parameters as `null`)
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .entries
            .iter()
            .map(|(name, param)| {
                let value = param.get().map(|v| v.to_json()).unwrap_or(serde_json::Value::Null);
                (name.clone(), value)
            })
            .collect();
        serde_json::Value::Object(map)
    }
}

/// Validate a parameter name without regex overhead
///
/// Valid names start with an ASCII letter or underscore, followed by ASCII
/// letters, digits, or underscores.
pub fn validate_name(name: &str) -> Result<(), ParamError> {
    let Some(&first) = name.as_bytes().first() else {
        return Err(ParamError::InvalidName {
            name: String::new(),
            reason: "cannot be empty".into(),
        });
    };

    if !(first.is_ascii_alphabetic() || first == b'_') {
        return Err(ParamError::InvalidName {
            name: name.to_string(),
            reason: "must start with a letter or underscore".into(),
        });
    }

    if name.bytes().skip(1).any(|b| !is_name_byte(b)) {
        return Err(ParamError::InvalidName {
            name: name.to_string(),
            reason: "may only contain letters, digits, or underscores".into(),
        });
    }

    Ok(())
}

pub(crate) fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
