//! Known runtime output phrases.
//!
//! Compatible runtimes word the same condition differently, and none of
//! them treats its CLI output as a stable contract. Matching is therefore
//! substring-based against this table. Supporting a new runtime means adding
//! rows; existing rows are never changed or removed.

/// Bumped whenever rows are added to [`BUILTIN_PHRASES`].
pub const PHRASE_TABLE_VERSION: u32 = 1;

/// A condition we know how to treat as something other than a hard error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recognized {
    /// Create failed because the name is taken.
    NameConflict,

    /// Remove failed because another remove of the same instance is running.
    RemovalInProgress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phrase {
    pub needle: String,
    pub recognized: Recognized,

    /// Which runtime prints it. Informational.
    pub origin: String,
}

impl Phrase {
    pub fn new(needle: impl Into<String>, recognized: Recognized, origin: impl Into<String>) -> Self {
        Self {
            needle: needle.into(),
            recognized,
            origin: origin.into(),
        }
    }
}

/// `(needle, condition, origin)`.
pub const BUILTIN_PHRASES: &[(&str, Recognized, &str)] = &[
    // v1
    ("is already in use", Recognized::NameConflict, "docker"),
    ("is already used", Recognized::NameConflict, "nerdctl"),
    ("already in progress", Recognized::RemovalInProgress, "docker"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhraseTable {
    phrases: Vec<Phrase>,
}

impl PhraseTable {
    pub fn builtin() -> Self {
        Self {
            phrases: BUILTIN_PHRASES
                .iter()
                .map(|(needle, recognized, origin)| Phrase::new(*needle, *recognized, *origin))
                .collect(),
        }
    }

    /// Add a phrase. Builtin rows stay in place.
    pub fn with(mut self, phrase: Phrase) -> Self {
        self.phrases.push(phrase);
        self
    }

    /// First recognized condition whose needle occurs in `output`.
    pub fn classify(&self, output: &str) -> Option<Recognized> {
        self.phrases
            .iter()
            .find(|p| output.contains(&p.needle))
            .map(|p| p.recognized)
    }

    pub fn is(&self, output: &str, recognized: Recognized) -> bool {
        self.phrases
            .iter()
            .any(|p| p.recognized == recognized && output.contains(&p.needle))
    }

    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }
}

impl Default for PhraseTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::docker(
        "docker: Error response from daemon: Conflict. The container name \"/berth-engine-3f1c9a0b7d2e4f6a\" is already in use by container \"9c1e\".",
        Some(Recognized::NameConflict)
    )]
    #[case::podman(
        "Error: creating container storage: the container name \"berth-engine-3f1c9a0b7d2e4f6a\" is already in use by 9c1e.",
        Some(Recognized::NameConflict)
    )]
    #[case::nerdctl(
        "time=\"2024-01-01T00:00:00Z\" level=fatal msg=\"name \\\"berth-engine-3f1c9a0b7d2e4f6a\\\" is already used by ID \\\"9c1e\\\"\"",
        Some(Recognized::NameConflict)
    )]
    #[case::removal_race(
        "Error response from daemon: removal of container berth-engine-0a1b is already in progress",
        Some(Recognized::RemovalInProgress)
    )]
    #[case::unrelated("Error response from daemon: No such container: berth-engine-0a1b", None)]
    #[case::empty("", None)]
    fn classifies_builtin_phrases(#[case] output: &str, #[case] expected: Option<Recognized>) {
        assert_eq!(PhraseTable::builtin().classify(output), expected);
    }

    #[test]
    fn added_phrases_do_not_break_builtin_matches() {
        let table = PhraseTable::builtin().with(Phrase::new(
            "name conflicts with an existing container",
            Recognized::NameConflict,
            "some-runtime",
        ));
        assert_eq!(table.len(), BUILTIN_PHRASES.len() + 1);
        assert!(table.is("name conflicts with an existing container", Recognized::NameConflict));
        assert!(table.is("x is already in use", Recognized::NameConflict));
        assert!(table.is("y is already used", Recognized::NameConflict));
    }

    #[test]
    fn is_checks_the_condition_kind() {
        let table = PhraseTable::builtin();
        assert!(!table.is("is already in use", Recognized::RemovalInProgress));
    }
}
