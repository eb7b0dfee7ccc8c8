//! Variable resolvers.
//!
//! This module contains basic support for variable resolvers and the expansion of `${...}` variables
//! in configuration values (URLs, install root).

use crate::platform::Platform;
use std::borrow::Cow;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::rc::Rc;

/// The error type for operations interacting with variables.
#[cfg_attr(test, derive(PartialEq))]
#[derive(Debug, thiserror::Error)]
pub(crate) enum VarError {
    /// The specified variable is not present.
    #[error("variable '{0}' not found")]
    NotPresent(String),
}

/// Trait for variable resolvers.
pub(crate) trait VarResolver: fmt::Debug {
    /// Resolves the variable with the given name.
    fn resolve_var(&self, var_name: &str) -> Result<String, VarError>;
}

/// [`VarResolver`] implementation that asks other variable resolvers in order.
#[derive(Debug)]
pub(crate) struct CombinedVarResolver {
    resolvers: Vec<Rc<dyn VarResolver>>,
}

impl CombinedVarResolver {
    /// Constructs a new `CombinedVarResolver` with the given variable resolvers.
    pub(crate) fn new<I>(resolvers: I) -> Self
    where
        I: IntoIterator<Item = Rc<dyn VarResolver>>,
    {
        Self {
            resolvers: Vec::from_iter(resolvers),
        }
    }
}

impl VarResolver for CombinedVarResolver {
    #[tracing::instrument(level = "trace", ret)]
    fn resolve_var(&self, v: &str) -> Result<String, VarError> {
        self.resolvers
            .iter()
            .find_map(|resolver| resolver.resolve_var(v).ok())
            .ok_or_else(|| VarError::NotPresent(v.to_owned()))
    }
}

/// [`VarResolver`] implementation for environment variables of the operating system.
#[derive(Debug)]
pub(crate) struct OsEnvVarResolver;

impl VarResolver for OsEnvVarResolver {
    #[tracing::instrument(level = "trace", ret)]
    fn resolve_var(&self, v: &str) -> Result<String, VarError> {
        env::var(v).map_err(|_| VarError::NotPresent(v.to_owned()))
    }
}

/// [`VarResolver`] that first removes the given prefix from the variable and then delegates to the given resolver.
#[derive(Debug)]
pub(crate) struct PrefixedVarResolver {
    resolver: Rc<dyn VarResolver>,
    prefix: String,
}

impl PrefixedVarResolver {
    /// Constructs a new `PrefixedVarResolver` for the given variable resolver.
    pub(crate) fn new(prefix: impl Into<String>, resolver: Rc<dyn VarResolver>) -> Self {
        Self {
            prefix: prefix.into(),
            resolver,
        }
    }
}

impl VarResolver for PrefixedVarResolver {
    #[tracing::instrument(level = "trace", ret)]
    fn resolve_var(&self, v: &str) -> Result<String, VarError> {
        match v.strip_prefix(&self.prefix) {
            Some(v) => self.resolver.resolve_var(v),
            None => Err(VarError::NotPresent(v.to_owned())),
        }
    }
}

/// [`VarResolver`] implementation for simple variables.
#[derive(Debug, Default)]
pub(crate) struct SimpleVarResolver<'a> {
    vars: HashMap<&'a str, String>,
}

impl<'a> SimpleVarResolver<'a> {
    /// Constructs a new `SimpleVarResolver`.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Constructs a new `SimpleVarResolver` holding the variables describing the given platform.
    pub(crate) fn for_platform(platform: &Platform) -> Self {
        let family = if platform.is_windows() { "windows" } else { "unix" };

        let mut resolver = Self::new();
        resolver.insert("XI_ARCH", platform.arch.as_str());
        resolver.insert("XI_ARCHIVE", platform.server_archive().to_string());
        resolver.insert("XI_FAMILY", family);
        resolver.insert("XI_OS", platform.os.as_str());
        resolver.insert("XI_PLATFORM", platform.asset_label());
        resolver
    }

    /// Registers the value for the given variable name.
    pub(crate) fn insert<V: Into<String>>(&mut self, name: &'a str, val: V) {
        self.vars.insert(name, val.into());
    }
}

impl VarResolver for SimpleVarResolver<'_> {
    #[tracing::instrument(level = "trace", ret)]
    fn resolve_var(&self, v: &str) -> Result<String, VarError> {
        self.vars.get(v).cloned().ok_or_else(|| VarError::NotPresent(v.to_owned()))
    }
}

/// Expands variables in strings with the help of variable resolvers.
#[derive(Debug)]
pub(crate) struct VarExpander {
    // The chain of variable resolvers.
    #[doc(hidden)]
    resolver: CombinedVarResolver,
}

impl VarExpander {
    /// Constructs a new `VarExpander` with the given variable resolvers.
    pub(crate) fn new<I>(resolvers: I) -> Self
    where
        I: IntoIterator<Item = Rc<dyn VarResolver>>,
    {
        Self {
            resolver: CombinedVarResolver::new(resolvers),
        }
    }

    /// Constructs the `VarExpander` used for configuration values.
    ///
    /// Knows the platform variables (`XI_*`) and the environment variables of the operating system (`env.*`).
    pub(crate) fn for_platform(platform: &Platform) -> Self {
        let platform_vars: Rc<dyn VarResolver> = Rc::new(SimpleVarResolver::for_platform(platform));
        let env_vars: Rc<dyn VarResolver> = Rc::new(PrefixedVarResolver::new("env.", Rc::new(OsEnvVarResolver)));
        Self::new([platform_vars, env_vars])
    }

    /// Expands all known variables in the given string.
    #[tracing::instrument(level = "trace", ret)]
    pub(crate) fn expand<'a, S>(&self, s: &'a S) -> Result<Cow<'a, str>, VarError>
    where
        S: ?Sized + AsRef<str> + fmt::Debug,
    {
        let s = s.as_ref();
        let expanded = self.expand_inner(s)?;
        if expanded == s { Ok(Cow::Borrowed(s)) } else { Ok(Cow::Owned(expanded)) }
    }

    // Expands all known variables in the given string, repeating until nothing changes anymore.
    fn expand_inner(&self, s: &str) -> Result<String, VarError> {
        let expanded = shellexpand::env_with_context(s, |s| self.resolve(s)) //
            .map_err(|err| err.cause)? //
            .to_string();

        if expanded == s {
            return Ok(expanded);
        }

        self.expand_inner(&expanded)
    }

    // Provides the context for `expand`.
    #[doc(hidden)]
    fn resolve(&self, v: &str) -> Result<Option<String>, VarError> {
        self.resolver.resolve_var(v).map(Option::Some)
    }
}
