//! Collision-free table aliases, recursive table names and parameter names.

/// Alias and name of a recursive CTE table, e.g. `RTT0` / `Tree0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecursiveTable {
    pub alias: String,
    pub name: String,
}

/// Per-pass name counters.
///
/// Reset once at the start of each top-level translation; nested calls share
/// the same allocator so earlier aliases stay valid.
#[derive(Debug, Clone, Default)]
pub struct NameAllocator {
    alias_seq: usize,
    recursive_seq: usize,
    parameter_seq: usize,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Sub-object alias `T{n}`.
    pub fn new_alias(&mut self) -> String {
        let alias = format!("T{}", self.alias_seq);
        self.alias_seq += 1;
        alias
    }

    pub fn new_recursive_table(&mut self) -> RecursiveTable {
        let seq = self.recursive_seq;
        self.recursive_seq += 1;
        RecursiveTable {
            alias: format!("RTT{}", seq),
            name: format!("Tree{}", seq),
        }
    }

    /// `base` followed by the pass-wide parameter counter.
    ///
    /// Characters that cannot appear in a parameter name are replaced by `_`.
    pub fn new_parameter_name(&mut self, base: &str) -> String {
        let mut name: String = base
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        if name.is_empty() {
            name.push('p');
        }
        name.push_str(&self.parameter_seq.to_string());
        self.parameter_seq += 1;
        name
    }

    #[cfg(test)]
    pub(crate) fn parameter_sequence(&self) -> usize {
        self.parameter_seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequences_are_independent() {
        let mut names = NameAllocator::new();
        assert_eq!(names.new_alias(), "T0");
        assert_eq!(names.new_parameter_name("Age"), "Age0");
        assert_eq!(names.new_alias(), "T1");
        assert_eq!(names.new_parameter_name("Status"), "Status1");
        assert_eq!(
            names.new_recursive_table(),
            RecursiveTable {
                alias: "RTT0".to_string(),
                name: "Tree0".to_string()
            }
        );
    }

    #[test]
    fn test_reset() {
        let mut names = NameAllocator::new();
        names.new_parameter_name("Age");
        names.new_alias();
        names.reset();
        assert_eq!(names.parameter_sequence(), 0);
        assert_eq!(names.new_alias(), "T0");
        assert_eq!(names.new_parameter_name("Age"), "Age0");
    }

    #[test]
    fn test_parameter_name_sanitized() {
        let mut names = NameAllocator::new();
        assert_eq!(names.new_parameter_name("Data.Path"), "Data_Path0");
        assert_eq!(names.new_parameter_name(""), "p1");
    }
}
