use indexmap::IndexMap;

use crate::error::Error;

/// Where a label points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    /// Listing line of the definition.
    pub line: usize,
    /// Index of the instruction following the label.
    pub index: usize,
    /// Byte offset of that instruction (start of its prefix chain).
    pub offset: u32,
}

/// label -> binding, in definition order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolTable {
    labels: IndexMap<String, Binding>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            labels: IndexMap::new(),
        }
    }

    pub fn define(&mut self, name: &str, line: usize, index: usize, offset: u32) -> Result<(), Error> {
        if self.labels.contains_key(name) {
            return Err(Error::DuplicateLabel(line, name.to_string()));
        }
        self.labels.insert(
            name.to_string(),
            Binding {
                line,
                index,
                offset,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.labels.get(name)
    }

    pub fn offset(&self, name: &str) -> Option<u32> {
        self.labels.get(name).map(|b| b.offset)
    }

    /// Rebind every label to its instruction's final offset. `offsets` holds
    /// one entry per instruction plus the end of the code.
    pub fn relocate(&mut self, offsets: &[u32]) {
        for binding in self.labels.values_mut() {
            if let Some(&offset) = offsets.get(binding.index) {
                binding.offset = offset;
            }
        }
    }

    /// (label, binding) pairs in definition order
    #[cfg(test)]
    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &Binding)> {
        self.labels.iter().map(|(name, b)| (name.as_str(), b))
    }

    /// label -> offset
    pub fn offsets(&self) -> IndexMap<String, u32> {
        self.labels
            .iter()
            .map(|(name, b)| (name.clone(), b.offset))
            .collect()
    }
}
