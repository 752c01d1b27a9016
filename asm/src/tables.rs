use arch::flags::CodeFlag;
use indexmap::IndexMap;

use crate::error::Error;
use crate::source::{Entry, Source};
use crate::value::Const;

/// What occupies constant slot 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReservedSlot {
    /// `None`, aliased as `none`.
    #[default]
    None,
    /// The unit's documentation text, aliased as `__doc__`.
    Doc,
}

/// Constant table with case-insensitive aliases.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstPool {
    values: Vec<Const>,
    aliases: IndexMap<String, usize>,
}

impl ConstPool {
    pub fn new(slot: ReservedSlot, doc: Option<&str>) -> Self {
        let (value, alias) = match slot {
            ReservedSlot::None => (Const::None, "none"),
            ReservedSlot::Doc => (
                doc.map(|d| Const::Str(d.to_string())).unwrap_or(Const::None),
                "__doc__",
            ),
        };
        let mut aliases = IndexMap::new();
        aliases.insert(alias.to_string(), 0);
        ConstPool {
            values: vec![value],
            aliases,
        }
    }

    /// Append a constant and return its slot.
    pub fn push(&mut self, alias: Option<&str>, value: Const) -> usize {
        let idx = self.values.len();
        self.values.push(value);
        if let Some(alias) = alias {
            self.aliases.insert(alias.to_lowercase(), idx);
        }
        idx
    }

    pub fn index_of(&self, alias: &str) -> Option<usize> {
        self.aliases.get(&alias.to_lowercase()).copied()
    }

    pub fn values(&self) -> &[Const] {
        &self.values
    }

    pub fn aliases(&self) -> &IndexMap<String, usize> {
        &self.aliases
    }
}

impl Default for ConstPool {
    fn default() -> Self {
        ConstPool::new(ReservedSlot::None, None)
    }
}

/// Operand resolution tables of one unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tables {
    pub argcount: usize,
    pub varnames: Vec<String>,
    pub names: Vec<String>,
    pub consts: ConstPool,
    pub freevars: Vec<String>,
    pub cellvars: Vec<String>,
    pub flags: u32,
}

impl Tables {
    /// Empty tables whose locals start with the given parameters.
    pub fn new<S: AsRef<str>>(params: &[S]) -> Self {
        Tables {
            argcount: params.len(),
            varnames: params.iter().map(|p| p.as_ref().to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with_locals(mut self, locals: &[&str]) -> Self {
        self.varnames.extend(locals.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_names(mut self, names: &[&str]) -> Self {
        self.names = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_freevars(mut self, freevars: &[&str]) -> Self {
        self.freevars = freevars.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_cellvars(mut self, cellvars: &[&str]) -> Self {
        self.cellvars = cellvars.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_consts(mut self, consts: ConstPool) -> Self {
        self.consts = consts;
        self
    }

    /// Build every table from the listing's sections.
    pub fn build<S: AsRef<str>>(
        source: &Source,
        params: &[S],
        slot: ReservedSlot,
    ) -> Result<Self, Error> {
        let mut tables = Tables::new(params);
        tables.varnames.extend(split_list(source.section("locals")));
        tables.names = split_list(source.section("names"));
        tables.freevars = split_list(source.section("freevars"));
        tables.cellvars = split_list(source.section("cellvars"));
        tables.flags = parse_flags(source.section("flags"))?;
        tables.consts = parse_consts(source.section("consts"), slot, source.doc())?;
        Ok(tables)
    }

    pub fn local(&self, name: &str) -> Option<usize> {
        self.varnames.iter().position(|v| v == name)
    }

    pub fn name(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|v| v == name)
    }

    pub fn constant(&self, alias: &str) -> Option<usize> {
        self.consts.index_of(alias)
    }

    /// Cell slots come first, free slots follow them.
    pub fn free_or_cell(&self, name: &str) -> Option<usize> {
        if let Some(idx) = self.cellvars.iter().position(|v| v == name) {
            return Some(idx);
        }
        self.freevars
            .iter()
            .position(|v| v == name)
            .map(|idx| idx + self.cellvars.len())
    }
}

/// Name of a free/cell slot; the inverse of [`Tables::free_or_cell`].
pub fn free_or_cell_name<'n>(cellvars: &'n [String], freevars: &'n [String], idx: usize) -> Option<&'n str> {
    match cellvars.get(idx) {
        Some(name) => Some(name.as_str()),
        None => freevars
            .get(idx.checked_sub(cellvars.len())?)
            .map(|s| s.as_str()),
    }
}

fn split_list(entries: &[Entry]) -> Vec<String> {
    entries
        .iter()
        .flat_map(|e| e.text.split(','))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn parse_flags(entries: &[Entry]) -> Result<u32, Error> {
    let mut flags = 0;
    for entry in entries {
        for word in entry.text.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()) {
            flags |= CodeFlag::parse(word)
                .map_err(|_| Error::InvalidFlag(entry.line, word.to_string()))?;
        }
    }
    Ok(flags)
}

fn parse_consts(entries: &[Entry], slot: ReservedSlot, doc: Option<&str>) -> Result<ConstPool, Error> {
    let mut pool = ConstPool::new(slot, doc);
    for entry in entries {
        // alias = literal, unless the `=` sits inside a string literal
        let (alias, literal) = match entry.text.split_once('=') {
            Some((alias, literal)) if is_alias(alias.trim()) => (Some(alias.trim()), literal),
            _ => (None, entry.text.as_str()),
        };
        let value = Const::parse(literal)
            .ok_or_else(|| Error::InvalidConstant(entry.line, literal.trim().to_string()))?;
        pool.push(alias, value);
    }
    Ok(pool)
}

fn is_alias(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}
