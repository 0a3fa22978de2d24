//! Module identity.
//!
//! A module is identified by its organization, name, and version. The
//! identity is the prefix of every qualified symbol name and of every
//! generated code unit name.

use std::fmt;

/// Organization owning the builtin `lang.*` modules.
pub const TERN_ORG: &str = "tern";

/// Organization used for single-file programs with no declared org.
pub const ANON_ORG: &str = "$anon";

/// Identity of a module: organization, name, and version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleId {
    /// Organization name (e.g. "tern", "orgX").
    pub org: String,
    /// Module name (e.g. "lang.value", "http").
    pub name: String,
    /// Resolved version string (e.g. "1.2.0").
    pub version: String,
}

impl ModuleId {
    /// Create a module identity.
    pub fn new(
        org: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            org: org.into(),
            name: name.into(),
            version: version.into(),
        }
    }

    /// Create a builtin `tern/lang.*` module identity.
    pub fn lang(name: &str) -> Self {
        Self::new(TERN_ORG, format!("lang.{name}"), "0.0.0")
    }

    /// Whether this is one of the builtin `tern/lang.*` modules.
    pub fn is_lang_module(&self) -> bool {
        self.org == TERN_ORG && self.name.starts_with("lang.")
    }

    /// Alias used when resolving a module from the cache.
    ///
    /// Anonymous-org modules are addressed by bare name.
    pub fn alias(&self) -> String {
        if self.org == ANON_ORG {
            self.name.clone()
        } else {
            format!("{}/{}", self.org, self.name)
        }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.org, self.name, self.version)
    }
}
