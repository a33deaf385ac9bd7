// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
/// An ordered list of path segments identifying a "directory" in object
/// storage, joined with `/` to form the canonical object name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KeyPath(Vec<String>);

impl KeyPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn child(&self, segment: impl Into<String>) -> KeyPath {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        KeyPath(segments)
    }

    pub fn as_prefix(&self) -> String {
        if self.0.is_empty() {
            String::new()
        } else {
            format!("{}/", self.0.join("/"))
        }
    }
}

/// Canonical join of a keypath and an object name, e.g.
/// `tenant/t1/<uuid>` + `data` -> `tenant/t1/<uuid>/data`.
pub fn object_file_name(keypath: &KeyPath, name: &str) -> String {
    format!("{}{name}", keypath.as_prefix())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_with_slash() {
        let kp = KeyPath::new(["tenant", "t1", "block-uuid"]);
        assert_eq!(object_file_name(&kp, "data"), "tenant/t1/block-uuid/data");
    }

    #[test]
    fn root_has_no_leading_slash() {
        let kp = KeyPath::root();
        assert_eq!(object_file_name(&kp, "tenant"), "tenant");
    }

    #[test]
    fn child_appends_segment() {
        let kp = KeyPath::new(["tenant"]).child("t1");
        assert_eq!(kp.segments(), ["tenant", "t1"]);
    }
}
