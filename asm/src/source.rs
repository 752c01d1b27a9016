use indexmap::IndexMap;

use crate::error::Error;

/// Marker separating documentation text from the listing proper.
pub const HEADER_MARKER: &str = ":::asm";

/// One non-empty listing line with comments stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// 0-based line index within the listing.
    pub line: usize,
    pub text: String,
}

impl Entry {
    pub fn new(line: usize, text: &str) -> Self {
        Entry {
            line,
            text: text.to_string(),
        }
    }
}

/// A listing split into its named sections.
#[derive(Debug, Clone, Default)]
pub struct Source {
    doc: Option<String>,
    header_lines: usize,
    sections: IndexMap<String, Vec<Entry>>,
}

impl Source {
    pub fn parse(text: &str) -> Self {
        let all: Vec<&str> = text.lines().collect();

        // Text before the marker line is documentation.
        let (doc, header_lines, body) = match all
            .iter()
            .position(|line| line.trim_start().starts_with(HEADER_MARKER))
        {
            Some(pos) => {
                let doc = all[..pos].join("\n").trim().to_string();
                let mut body: Vec<&str> = vec![all[pos]
                    .trim_start()
                    .trim_start_matches(HEADER_MARKER)];
                body.extend_from_slice(&all[pos + 1..]);
                (Some(doc).filter(|d| !d.is_empty()), pos, body)
            }
            None => (None, 0, all),
        };

        let mut sections: IndexMap<String, Vec<Entry>> = IndexMap::new();
        let mut current: Option<String> = None;
        for (idx, raw) in body.iter().enumerate() {
            let line = strip_comment(raw);
            if line.is_empty() {
                continue;
            }

            // .section [first entry]
            if let Some(header) = line.strip_prefix('.') {
                let mut words = header.split_whitespace();
                let Some(name) = words.next() else {
                    continue;
                };
                let name = name.to_ascii_lowercase();
                let rest = words.collect::<Vec<_>>().join(" ");
                let entries = sections.entry(name.clone()).or_default();
                if !rest.is_empty() {
                    entries.push(Entry::new(idx, &rest));
                }
                current = Some(name);
                continue;
            }

            if let Some(name) = &current {
                if let Some(entries) = sections.get_mut(name) {
                    entries.push(Entry::new(idx, line));
                }
            }
        }

        Source {
            doc,
            header_lines,
            sections,
        }
    }

    /// Build a source from already split sections.
    pub fn from_sections<I, S>(sections: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<Entry>)>,
        S: Into<String>,
    {
        Source {
            doc: None,
            header_lines: 0,
            sections: sections
                .into_iter()
                .map(|(name, entries)| (name.into(), entries))
                .collect(),
        }
    }

    pub fn with_doc(mut self, doc: &str, header_lines: usize) -> Self {
        self.doc = Some(doc.to_string());
        self.header_lines = header_lines;
        self
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    /// Number of lines preceding the listing.
    pub fn header_lines(&self) -> usize {
        self.header_lines
    }

    pub fn section(&self, name: &str) -> &[Entry] {
        self.sections.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn require(&self, name: &str) -> Result<&[Entry], Error> {
        match self.sections.get(name) {
            Some(entries) if !entries.is_empty() => Ok(entries),
            _ => Err(Error::MissingSection(name.to_string())),
        }
    }
}

fn strip_comment(raw: &str) -> &str {
    match raw.split_once(';') {
        Some((code, _)) => code.trim(),
        None => raw.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CODE: &str = "
.stacksize  2   ;comment

.consts
   4

; line with comment
.code;comment
   LOAD_FAST 0
   LOAD_CONST 1
   BINARY_ADD
   RETURN_VALUE ;another comment

";

    #[test]
    fn test_sections() {
        let src = Source::parse(SAMPLE_CODE);
        let code = src.section("code");
        assert_eq!(code.len(), 4);
        assert_eq!(code[0], Entry::new(8, "LOAD_FAST 0"));
        assert_eq!(code[3], Entry::new(11, "RETURN_VALUE"));
        assert_eq!(src.section("consts"), &[Entry::new(4, "4")]);
        assert_eq!(src.section("stacksize"), &[Entry::new(1, "2")]);
        assert_eq!(src.doc(), None);
        assert_eq!(src.header_lines(), 0);
    }

    #[test]
    fn test_header() {
        let src = Source::parse("Adds one\nto its argument\n  :::asm\n.stacksize 1\n.code\n  NOP\n");
        assert_eq!(src.doc(), Some("Adds one\nto its argument"));
        assert_eq!(src.header_lines(), 2);
        assert_eq!(src.section("stacksize"), &[Entry::new(1, "1")]);
        assert_eq!(src.section("code"), &[Entry::new(3, "NOP")]);
    }

    #[test]
    fn test_missing_section() {
        let src = Source::parse(".code\n NOP\n");
        assert_eq!(
            src.require("stacksize").err(),
            Some(Error::MissingSection("stacksize".to_string()))
        );
        assert!(src.require("code").is_ok());
    }
}
