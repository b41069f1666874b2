use std::collections::BTreeMap;

/// Determines what happens when a generated resource would overwrite an
/// existing resource that the controller does not own.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConflictPolicy {
    /// Leave the existing resource untouched and report a conflict.
    #[default]
    Fail,

    /// Take ownership of the existing resource and overwrite it.
    Replace,
}

impl ConflictPolicy {
    pub const ANNOTATION: &'static str = "networking.desuuuu.com/conflict-policy";
    const REPLACE: &'static str = "replace";

    /// Reads the conflict policy from a resource's annotations. Anything other
    /// than `replace` means [`ConflictPolicy::Fail`].
    pub fn from_annotations(annotations: &BTreeMap<String, String>) -> Self {
        match annotations.get(Self::ANNOTATION).map(String::as_str) {
            Some(Self::REPLACE) => Self::Replace,
            _ => Self::Fail,
        }
    }

    pub fn is_replace(&self) -> bool {
        matches!(self, Self::Replace)
    }
}
