//! Namelist reading, overlay merging and rewriting.
//!
//! Tool namelists are derived from a template plus a typed set of overrides.
//! Each override set is tied to a [`KeySchema`] listing the group/key pairs it
//! may touch, so a typo in a key name is a configuration error instead of a
//! silently ignored binding.
mod codec;

pub use codec::{parse, render, render_value};

use crate::cycle::Domain;
use crate::error::CycleError;
use crate::fsutil::silent_remove;
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::Path;

/// A namelist value: a scalar literal or a per-domain array of scalars.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Real(f64),
    Logical(bool),
    Text(String),
    Array(Vec<Value>),
}

impl Value {
    /// Select the value that applies to `domain`.
    ///
    /// Arrays yield their `domain - 1` element; scalars apply to every domain
    /// and come back unchanged. Whether a field is an array depends on how
    /// the model namelist was written (single-domain runs often use scalars).
    pub fn for_domain(&self, domain: Domain) -> Result<Value> {
        match self {
            Value::Array(items) => items.get(domain.index()).cloned().ok_or_else(|| {
                anyhow!(CycleError::parse(
                    "namelist",
                    format!(
                        "array of {} values has no entry for domain {}",
                        items.len(),
                        domain.id()
                    ),
                ))
            }),
            scalar => Ok(scalar.clone()),
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Logical(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

/// One `&name ... /` block, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    name: String,
    entries: Vec<(String, Value)>,
}

impl Group {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }
}

/// Section name → key → value, with group and key order preserved.
///
/// Names are stored lowercase; lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Namelist {
    groups: Vec<Group>,
}

impl Namelist {
    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter()
    }

    pub fn get(&self, group: &str, key: &str) -> Option<&Value> {
        let group = group.to_ascii_lowercase();
        let key = key.to_ascii_lowercase();
        self.groups
            .iter()
            .find(|g| g.name == group)
            .and_then(|g| g.get(&key))
    }

    /// Like [`Namelist::get`] but a missing binding is a configuration error.
    pub fn require(&self, group: &str, key: &str) -> Result<&Value> {
        self.get(group, key).ok_or_else(|| {
            anyhow!(CycleError::Configuration(format!(
                "namelist has no {group}.{key}"
            )))
        })
    }

    /// Bind `key` in `group`, replacing an existing binding in place.
    pub fn set(&mut self, group: &str, key: &str, value: Value) {
        let key = key.to_ascii_lowercase();
        let group = self.ensure_group(group);
        match group.entries.iter_mut().find(|(name, _)| *name == key) {
            Some((_, slot)) => *slot = value,
            None => group.entries.push((key, value)),
        }
    }

    fn ensure_group(&mut self, name: &str) -> &mut Group {
        let name = name.to_ascii_lowercase();
        let idx = match self.groups.iter().position(|g| g.name == name) {
            Some(idx) => idx,
            None => {
                self.groups.push(Group {
                    name,
                    entries: Vec::new(),
                });
                self.groups.len() - 1
            }
        };
        &mut self.groups[idx]
    }
}

/// The group/key pairs one tool namelist may have overridden.
#[derive(Debug)]
pub struct KeySchema {
    pub name: &'static str,
    pub groups: &'static [(&'static str, &'static [&'static str])],
}

impl KeySchema {
    pub fn allows(&self, group: &str, key: &str) -> bool {
        self.groups.iter().any(|(name, keys)| {
            name.eq_ignore_ascii_case(group) && keys.iter().any(|k| k.eq_ignore_ascii_case(key))
        })
    }
}

/// An ordered overlay of values to apply on top of a template namelist.
#[derive(Debug, Clone)]
pub struct Overrides {
    schema: &'static KeySchema,
    entries: Vec<(String, String, Value)>,
}

impl Overrides {
    pub fn new(schema: &'static KeySchema) -> Self {
        Self {
            schema,
            entries: Vec::new(),
        }
    }

    pub fn set(&mut self, group: &str, key: &str, value: impl Into<Value>) -> &mut Self {
        self.entries
            .push((group.to_string(), key.to_string(), value.into()));
        self
    }

    /// Copy `group.key` from `source`, narrowed to `domain`.
    pub fn set_for_domain(
        &mut self,
        source: &Namelist,
        source_group: &str,
        group: &str,
        key: &str,
        domain: Domain,
    ) -> Result<&mut Self> {
        let value = source
            .require(source_group, key)?
            .for_domain(domain)
            .with_context(|| format!("select {source_group}.{key} for {domain}"))?;
        Ok(self.set(group, key, value))
    }
}

/// Apply `overrides` to a copy of `base`.
///
/// Every override is checked against the set's schema before anything is
/// applied; the first unknown pair fails the whole merge.
pub fn merge(base: &Namelist, overrides: &Overrides) -> Result<Namelist> {
    if let Some((group, key, _)) = overrides
        .entries
        .iter()
        .find(|(group, key, _)| !overrides.schema.allows(group, key))
    {
        return Err(anyhow!(CycleError::Configuration(format!(
            "{group}.{key} is not a recognized {} key",
            overrides.schema.name
        ))));
    }
    let mut merged = base.clone();
    for (group, key, value) in &overrides.entries {
        merged.set(group, key, value.clone());
    }
    tracing::debug!(
        schema = overrides.schema.name,
        overrides = overrides.entries.len(),
        "namelist merged"
    );
    Ok(merged)
}

/// Read and parse a namelist file.
pub fn read(path: &Path) -> Result<Namelist> {
    if !path.is_file() {
        return Err(anyhow!(CycleError::NotFound(path.to_path_buf())));
    }
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    parse(&text, &path.display().to_string())
}

/// Replace the file at `path` with `namelist`.
///
/// The stale file is removed first so nothing from a previous cycle survives.
/// The two steps are not atomic; callers must not share a path between
/// concurrent writers.
pub fn write(path: &Path, namelist: &Namelist) -> Result<()> {
    silent_remove(path)?;
    fs::write(path, render(namelist)).with_context(|| format!("write {}", path.display()))?;
    tracing::debug!(path = %path.display(), "namelist written");
    Ok(())
}
