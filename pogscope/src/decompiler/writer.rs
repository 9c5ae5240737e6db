//! The indenting source writer.

use std::fmt::Arguments;

/// Accumulates rendered source text with automatic indentation.
///
/// Indentation is one tab per level and is applied lazily: the first append after a
/// newline is prefixed with the current indent, so multi-part lines can be built from
/// several appends without extra bookkeeping at the call sites.
pub struct CodeWriter {
    output: String,
    indent: usize,
}

impl CodeWriter {
    /// Create an empty writer.
    #[must_use]
    pub fn new() -> Self {
        CodeWriter {
            output: String::new(),
            indent: 0,
        }
    }

    /// Increase the indent level.
    pub fn push_indent(&mut self) {
        self.indent += 1;
    }

    /// Decrease the indent level, saturating at zero.
    pub fn pop_indent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    fn handle_indent(&mut self) {
        if self.output.ends_with('\n') {
            for _ in 0..self.indent {
                self.output.push('\t');
            }
        }
    }

    /// Append text, indenting if this starts a new line.
    pub fn append(&mut self, s: &str) {
        self.handle_indent();
        self.output.push_str(s);
    }

    /// Append formatted text, indenting if this starts a new line.
    pub fn appendf(&mut self, args: Arguments<'_>) {
        self.handle_indent();
        use std::fmt::Write as _;
        let _ = self.output.write_fmt(args);
    }

    /// The accumulated output.
    #[must_use]
    pub fn finish(self) -> String {
        self.output
    }

    /// Borrow the accumulated output.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.output
    }
}

impl Default for CodeWriter {
    fn default() -> Self {
        CodeWriter::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indentation_applied_after_newline() {
        let mut writer = CodeWriter::new();
        writer.append("if ( x )\n");
        writer.append("{\n");
        writer.push_indent();
        writer.append("y = 1;\n");
        writer.appendf(format_args!("z = {};\n", 2));
        writer.pop_indent();
        writer.append("}\n");

        assert_eq!(writer.finish(), "if ( x )\n{\n\ty = 1;\n\tz = 2;\n}\n");
    }

    #[test]
    fn test_partial_lines_not_reindented() {
        let mut writer = CodeWriter::new();
        writer.push_indent();
        writer.append("a = ");
        writer.append("b;\n");
        assert_eq!(writer.finish(), "\ta = b;\n");
    }

    #[test]
    fn test_pop_saturates() {
        let mut writer = CodeWriter::new();
        writer.pop_indent();
        writer.append("x\n");
        assert_eq!(writer.as_str(), "x\n");
    }
}
