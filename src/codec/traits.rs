//! Class descriptor used by AMF3 to encode sealed objects compactly and
//! reference them in later occurrences (spec §3 "Traits").

/// Separator used to build the traits cache key; not permitted in AMF3
/// identifiers, so `alias\x00prop1\x00prop2...` can't collide with a
/// differently-propertied class (spec §4.1 "Traits cache key").
const KEY_SEPARATOR: &str = "\u{0}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Traits {
    /// Registered class alias; empty for anonymous objects.
    pub alias: String,
    pub qualified_name: String,
    pub is_dynamic: bool,
    pub is_externalizable: bool,
    pub sealed_properties: Vec<String>,
}

impl Traits {
    pub fn anonymous_dynamic() -> Self {
        Traits {
            alias: String::new(),
            qualified_name: String::new(),
            is_dynamic: true,
            is_externalizable: false,
            sealed_properties: Vec::new(),
        }
    }

    pub fn sealed(alias: impl Into<String>, properties: Vec<String>) -> Self {
        let alias = alias.into();
        Traits {
            qualified_name: alias.clone(),
            alias,
            is_dynamic: false,
            is_externalizable: false,
            sealed_properties: properties,
        }
    }

    pub fn externalizable(alias: impl Into<String>) -> Self {
        let alias = alias.into();
        Traits {
            qualified_name: alias.clone(),
            alias,
            is_dynamic: false,
            is_externalizable: true,
            sealed_properties: Vec::new(),
        }
    }

    /// Cache key per spec §4.1: "the alias followed by the ordered property
    /// names, joined by a separator not permitted in identifiers".
    pub fn cache_key(&self) -> String {
        let mut key = self.alias.clone();
        for prop in &self.sealed_properties {
            key.push_str(KEY_SEPARATOR);
            key.push_str(prop);
        }
        key
    }
}
