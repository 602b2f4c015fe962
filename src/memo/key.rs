//! Cache Key Module
//!
//! Derives structural cache keys from producer arguments.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

use super::canonical::to_canonical;
use crate::error::Result;

// == Cache Key ==
/// Canonical identity of a producer call.
///
/// Arguments are serialized into a canonical JSON value and rendered
/// compactly. Objects are ordered by key, tuples become arrays and `Option`
/// layers are tagged, so two keys are equal only when the arguments are.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    // == Derive ==
    /// Derives the key for a set of arguments.
    ///
    /// Fails with `MemoError::KeyDerivation` when the arguments have no exact
    /// representation, such as a NaN or infinite float, or when their
    /// `Serialize` impl reports an error.
    pub fn derive<A>(args: &A) -> Result<Self>
    where
        A: Serialize + ?Sized,
    {
        Ok(Self(to_canonical(args)?.to_string()))
    }

    /// Returns the canonical text of the key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// == Call Args ==
/// Positional and keyword arguments for producers that want both.
///
/// Keyword arguments are kept sorted by name, so the order they were supplied
/// in never changes the derived key.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CallArgs {
    positional: Vec<Value>,
    keyword: BTreeMap<String, Value>,
}

impl CallArgs {
    /// Creates an empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    pub fn arg<T: Serialize>(mut self, value: T) -> Result<Self> {
        self.positional.push(to_canonical(&value)?);
        Ok(self)
    }

    /// Sets a keyword argument, replacing any previous value for that name.
    pub fn kwarg<T: Serialize>(mut self, name: impl Into<String>, value: T) -> Result<Self> {
        self.keyword.insert(name.into(), to_canonical(&value)?);
        Ok(self)
    }

    /// Positional arguments in call order.
    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    /// Looks up a keyword argument by name.
    pub fn keyword(&self, name: &str) -> Option<&Value> {
        self.keyword.get(name)
    }
}
