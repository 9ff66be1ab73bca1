//! Verbs: named browser interactions called from test steps
//!
//! A verb declares its parameters by name. Callers may supply values three
//! ways, merged with increasing precedence: a `data` mapping keyword, plain
//! keywords, then positionals. Parameters nobody supplied stay null.

use std::time::Instant;

use futures_util::future::BoxFuture;
use indexmap::IndexMap;
use serde_json::Value;

use super::driver::Driver;
use crate::common::{sanitize, Error, Result};

/// Future returned by a verb body
pub type VerbFuture<'a> = BoxFuture<'a, Result<()>>;

/// Signature every verb body has
pub type VerbFn = for<'a> fn(&'a mut Driver, &'a VerbArgs) -> VerbFuture<'a>;

/// Keyword arguments, in the order they were written
pub type Keywords = IndexMap<String, Value>;

/// Keyword holding a mapping of default parameter values
pub const DATA_KEYWORD: &str = "data";

/// A registered verb
pub struct Verb {
    pub name: &'static str,
    pub params: &'static [&'static str],
    pub doc: &'static str,
    handler: VerbFn,
}

impl Verb {
    pub const fn new(
        name: &'static str,
        params: &'static [&'static str],
        doc: &'static str,
        handler: VerbFn,
    ) -> Self {
        Self {
            name,
            params,
            doc,
            handler,
        }
    }

    /// "form_authentication" -> "Form Authentication"
    pub fn title(&self) -> String {
        self.name
            .split('_')
            .filter(|w| !w.is_empty())
            .map(|w| {
                let mut chars = w.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl std::fmt::Debug for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verb")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

/// Arguments after resolution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerbArgs {
    params: IndexMap<String, Value>,
    extras: IndexMap<String, Value>,
}

impl VerbArgs {
    /// Value of a declared parameter or extra keyword; null counts as unset
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.params
            .get(name)
            .or_else(|| self.extras.get(name))
            .filter(|v| !v.is_null())
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// String value of a parameter, failing the verb when it is unset
    ///
    /// Numbers and booleans are rendered as text so fixtures can hold them
    /// unquoted.
    pub fn require_str(&self, verb: &str, name: &str) -> Result<String> {
        match self.get(name) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(Value::Bool(b)) => Ok(b.to_string()),
            _ => Err(Error::missing_argument(verb, name)),
        }
    }

    /// Declared parameters in declaration order, unset ones as null
    pub fn params(&self) -> &IndexMap<String, Value> {
        &self.params
    }

    /// Keywords that matched no declared parameter
    pub fn extras(&self) -> &IndexMap<String, Value> {
        &self.extras
    }
}

/// Merge the supplied arguments onto a verb's declared parameters
///
/// Precedence is `data < keywords < positionals`. Data keys naming no
/// parameter are dropped, unknown keywords are kept as extras, and
/// positionals past the last parameter are ignored.
pub fn resolve(params: &[&str], positional: &[Value], keywords: &Keywords) -> VerbArgs {
    let mut args = VerbArgs {
        params: params
            .iter()
            .map(|p| (p.to_string(), Value::Null))
            .collect(),
        extras: IndexMap::new(),
    };

    if let Some(Value::Object(data)) = keywords.get(DATA_KEYWORD) {
        for (key, value) in data {
            if let Some(slot) = args.params.get_mut(key.as_str()) {
                *slot = value.clone();
            }
        }
    }

    for (key, value) in keywords {
        if key == DATA_KEYWORD {
            continue;
        }
        match args.params.get_mut(key.as_str()) {
            Some(slot) => *slot = value.clone(),
            None => {
                args.extras.insert(key.clone(), value.clone());
            }
        }
    }

    for (name, value) in params.iter().zip(positional) {
        if let Some(slot) = args.params.get_mut(*name) {
            *slot = value.clone();
        }
    }
    if positional.len() > params.len() {
        tracing::debug!(
            "Ignoring {} positional arguments past the declared parameters",
            positional.len() - params.len()
        );
    }

    args
}

/// Resolve arguments and run a verb
pub async fn invoke(
    verb: &Verb,
    driver: &mut Driver,
    positional: &[Value],
    keywords: &Keywords,
) -> Result<()> {
    let args = resolve(verb.params, positional, keywords);

    tracing::info!("{}", "-".repeat(40));
    tracing::info!("Verb: {}", verb.title());
    if !verb.doc.is_empty() {
        tracing::debug!("\n{}\n", verb.doc);
    }
    tracing::debug!("Parameters given...");
    for (name, value) in args.params().iter().chain(args.extras()) {
        tracing::debug!("Keyword {}: {}", name, value);
    }

    let started = Instant::now();
    let result = (verb.handler)(driver, &args).await;
    tracing::debug!("verb dt: {:.3} seconds", started.elapsed().as_secs_f64());
    result
}

/// A family of verbs looked up by sanitized name
pub struct VerbRegistry {
    family: &'static str,
    verbs: IndexMap<&'static str, Verb>,
}

impl VerbRegistry {
    pub fn new(family: &'static str) -> Self {
        Self {
            family,
            verbs: IndexMap::new(),
        }
    }

    pub fn with(mut self, verb: Verb) -> Self {
        self.register(verb);
        self
    }

    pub fn register(&mut self, verb: Verb) {
        self.verbs.insert(verb.name, verb);
    }

    pub fn family(&self) -> &'static str {
        self.family
    }

    pub fn get(&self, name: &str) -> Result<&Verb> {
        let key = sanitize(name);
        self.verbs
            .get(key.as_str())
            .ok_or_else(|| Error::unknown_verb(self.family, &key))
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.verbs.keys().copied()
    }
}
