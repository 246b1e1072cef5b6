//! Tab-separated record parsing.
//!
//! Page text is the concatenation of whole blocks, and block edges do not
//! line up with line edges. The parser therefore expects a partial line at
//! either end of the text and drops anything that does not look like a
//! complete record.

use serde::Serialize;

/// One tab-separated line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TsvRecord {
    pub fields: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TsvParser {
    columns: Option<Vec<String>>,
    comment_prefix: Option<String>,
}

impl Default for TsvParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TsvParser {
    pub fn new() -> Self {
        Self {
            columns: None,
            comment_prefix: Some("#".to_string()),
        }
    }

    /// Known column names. Lines with a different field count, and
    /// repeats of the header line itself, are skipped.
    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn with_comment_prefix(mut self, prefix: Option<String>) -> Self {
        self.comment_prefix = prefix;
        self
    }

    pub fn columns(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    /// Column names from the first non-blank line of `text`. A leading `#` is stripped.
    pub fn header_from(text: &str) -> Option<Vec<String>> {
        let line = text.lines().map(trim_line).find(|l| !l.is_empty())?;
        let line = line.strip_prefix('#').unwrap_or(line);
        Some(line.split('\t').map(|f| f.trim().to_string()).collect())
    }

    pub fn parse(&self, text: &str) -> Vec<TsvRecord> {
        text.lines()
            .map(trim_line)
            .filter(|line| !line.is_empty())
            .filter(|line| !self.is_comment(line))
            .map(|line| line.split('\t').map(str::to_string).collect::<Vec<_>>())
            .filter(|fields| self.is_record(fields))
            .map(|fields| TsvRecord { fields })
            .collect()
    }

    fn is_comment(&self, line: &str) -> bool {
        self.comment_prefix
            .as_deref()
            .is_some_and(|prefix| line.starts_with(prefix))
    }

    fn is_record(&self, fields: &[String]) -> bool {
        match &self.columns {
            Some(columns) => fields.len() == columns.len() && fields != columns.as_slice(),
            None => true,
        }
    }
}

fn trim_line(line: &str) -> &str {
    line.trim_end_matches('\r')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_plain_lines() {
        let rows = TsvParser::new().parse("a\t1\nb\t2\r\n\nc\t3");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].fields, vec!["b", "2"]);
    }

    #[test]
    fn test_comments_skipped() {
        let rows = TsvParser::new().parse("# generated\na\t1\n");
        assert_eq!(rows.len(), 1);

        let rows = TsvParser::new().with_comment_prefix(None).parse("# generated\na\t1\n");
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_seam_fragments_dropped_with_known_columns() {
        let parser = TsvParser::new().with_columns(columns(&["taxon", "reads", "abundance"]));
        let text = "45\t0.1\nBacteroides\t12\t0.3\ntaxon\treads\tabundance\nPrevotella\t7\t0.2\nAkker";
        let rows = parser.parse(text);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].fields[0], "Bacteroides");
        assert_eq!(rows[1].fields[0], "Prevotella");
    }

    #[test]
    fn test_header_from() {
        assert_eq!(
            TsvParser::header_from("\n#taxon\treads\nx\t1\n"),
            Some(columns(&["taxon", "reads"]))
        );
        assert_eq!(TsvParser::header_from(""), None);
    }

    #[test]
    fn test_record_serializes_as_array() {
        let record = TsvRecord {
            fields: columns(&["a", "1"]),
        };
        assert_eq!(serde_json::to_string(&record).unwrap(), r#"["a","1"]"#);
    }
}
