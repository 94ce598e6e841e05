//!
//! The shared environment of a simulation.
//!
//! Entities never talk through globals. Every simulation-wide value that
//! more than one entity reads or writes (the channel-busy flag, the number of
//! concurrent transmissions, the position of a mobile sink, ...) lives in one
//! [`Environment`], owned by the application and handed to each entity by
//! reference when it handles an event.
//!
//! Values are addressed by name through typed [`Key`]s:
//!
//! ```
//! use wsnsim::env::{Environment, Key};
//!
//! const CHANNEL_FREE: Key<bool> = Key::new("channelFree");
//! const CONCURRENT_TX: Key<i64> = Key::new("concurrentTransmissions");
//!
//! let mut env = Environment::new();
//! env.declare(CHANNEL_FREE, true);
//! env.declare(CONCURRENT_TX, 0);
//!
//! env.update(CONCURRENT_TX, |n| n + 1);
//! assert_eq!(env.get(CONCURRENT_TX), 1);
//! assert!(env.get(CHANNEL_FREE));
//! ```

use fxhash::FxHashMap;
use serde::Serialize;
use std::{
    collections::BTreeMap,
    fmt::{Debug, Display},
    marker::PhantomData,
};

/// A scalar value stored in the environment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// A flag.
    Bool(bool),
    /// A counter.
    Int(i64),
    /// A measured quantity.
    Float(f64),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
        }
    }
}

/// A type that can be stored in the environment.
pub trait Scalar: Copy {
    /// Wraps the value.
    fn into_value(self) -> Value;
    /// Unwraps the value, if it has the right type.
    fn from_value(value: Value) -> Option<Self>;
}

impl Scalar for bool {
    fn into_value(self) -> Value {
        Value::Bool(self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Bool(v) => Some(v),
            _ => None,
        }
    }
}

impl Scalar for i64 {
    fn into_value(self) -> Value {
        Value::Int(self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Int(v) => Some(v),
            _ => None,
        }
    }
}

impl Scalar for f64 {
    fn into_value(self) -> Value {
        Value::Float(self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Float(v) => Some(v),
            _ => None,
        }
    }
}

///
/// The typed name of a value in the environment.
///
pub struct Key<T> {
    name: &'static str,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> Key<T> {
    /// Creates a new key.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _phantom: PhantomData,
        }
    }

    /// The name of the value.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Key<T> {}

impl<T> Debug for Key<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Key({})", self.name)
    }
}

///
/// A flat store of named scalars, scoped to one simulation run.
///
#[derive(Debug, Clone, Default)]
pub struct Environment {
    values: FxHashMap<&'static str, Value>,
}

impl Environment {
    /// Creates an empty environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a value with its initial state, replacing any previous declaration.
    pub fn declare<T: Scalar>(&mut self, key: Key<T>, initial: T) {
        self.values.insert(key.name, initial.into_value());
    }

    /// Whether a value with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    ///
    /// Reads a value.
    ///
    /// # Panics
    ///
    /// Panics if the value was never declared or was declared with another type.
    ///
    #[must_use]
    pub fn get<T: Scalar>(&self, key: Key<T>) -> T {
        let value = self
            .values
            .get(key.name)
            .copied()
            .unwrap_or_else(|| panic!("environment value '{}' was never declared", key.name));

        T::from_value(value).unwrap_or_else(|| {
            panic!(
                "environment value '{}' is of type {}",
                key.name,
                value.type_name()
            )
        })
    }

    ///
    /// Writes a declared value.
    ///
    /// # Panics
    ///
    /// Panics if the value was never declared or was declared with another type.
    ///
    pub fn set<T: Scalar>(&mut self, key: Key<T>, value: T) {
        let _: T = self.get(key);
        self.values.insert(key.name, value.into_value());
    }

    /// Applies `f` to a declared value and returns the new value.
    pub fn update<T: Scalar>(&mut self, key: Key<T>, f: impl FnOnce(T) -> T) -> T {
        let value = f(self.get(key));
        self.values.insert(key.name, value.into_value());
        value
    }

    /// Returns all values, ordered by name.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<&'static str, Value> {
        self.values.iter().map(|(k, v)| (*k, *v)).collect()
    }
}

impl Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (name, value) in self.snapshot() {
            writeln!(f, "{name} = {value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLAG: Key<bool> = Key::new("flag");
    const COUNT: Key<i64> = Key::new("count");
    const ENERGY: Key<f64> = Key::new("energy");

    #[test]
    fn typed_access() {
        let mut env = Environment::new();
        env.declare(FLAG, false);
        env.declare(COUNT, 0);
        env.declare(ENERGY, 0.0);

        env.set(FLAG, true);
        assert_eq!(env.update(COUNT, |c| c + 2), 2);
        env.update(ENERGY, |e| e + 1.5);

        assert!(env.get(FLAG));
        assert_eq!(env.get(COUNT), 2);
        assert_eq!(env.get(ENERGY), 1.5);
        assert!(env.contains("count"));
        assert!(!env.contains("missing"));
    }

    #[test]
    #[should_panic(expected = "never declared")]
    fn undeclared_read_panics() {
        let env = Environment::new();
        let _ = env.get(COUNT);
    }

    #[test]
    #[should_panic(expected = "is of type bool")]
    fn mistyped_read_panics() {
        let mut env = Environment::new();
        env.declare(FLAG, true);
        let _ = env.get(Key::<i64>::new("flag"));
    }

    #[test]
    fn snapshot_is_ordered_and_serializable() {
        let mut env = Environment::new();
        env.declare(ENERGY, 2.5);
        env.declare(COUNT, 3);
        env.declare(FLAG, true);

        let names = env.snapshot().keys().copied().collect::<Vec<_>>();
        assert_eq!(names, vec!["count", "energy", "flag"]);

        let yaml = serde_yml::to_string(&env.snapshot()).unwrap();
        assert!(yaml.contains("count: 3"));
        assert!(yaml.contains("flag: true"));
        assert_eq!(env.to_string(), "count = 3\nenergy = 2.5\nflag = true\n");
    }
}
