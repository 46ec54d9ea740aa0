//! Diagnostic
//!
//! 后端报告给用户的一条消息。位置来自输入 AST 的行列号，后端看不到源码文本，
//! 所以这里不做代码片段高亮。

use std::fmt;

use colored::{ColoredString, Colorize};
use tessera_syntax::SourceLocation;

/// 严重程度，按 Note < Warning < Error 排序
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Note,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Note => "note",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }

    pub(crate) fn paint(self, text: &str) -> ColoredString {
        match self {
            Severity::Note => text.bright_black().bold(),
            Severity::Warning => text.yellow().bold(),
            Severity::Error => text.red().bold(),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一条诊断
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// 代码生成错误的稳定编号，如 `E0101`
    pub code: Option<&'static str>,
    pub message: String,
    pub location: Option<SourceLocation>,
    pub notes: Vec<String>,
    /// `help:` 行
    pub help: Vec<String>,
}

impl Diagnostic {
    fn with_severity(severity: Severity, message: impl Into<String>) -> Self {
        Diagnostic {
            severity,
            code: None,
            message: message.into(),
            location: None,
            notes: Vec::new(),
            help: Vec::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Warning, message)
    }

    pub fn note(message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Note, message)
    }

    pub fn code(self, code: &'static str) -> Self {
        Diagnostic {
            code: Some(code),
            ..self
        }
    }

    /// 附上位置；行号为 0 的未知位置不记录
    pub fn at(mut self, location: SourceLocation) -> Self {
        if !location.is_unknown() {
            self.location = Some(location);
        }
        self
    }

    /// 位置缺少文件名时用输入文件路径补全
    pub fn with_file(mut self, path: &str) -> Self {
        let location = self
            .location
            .get_or_insert_with(|| SourceLocation::new("", 0, 0));
        if location.file.is_empty() {
            location.file = path.to_string();
        }
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn suggest(mut self, help: impl Into<String>) -> Self {
        self.help.push(help.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Note);
        assert_eq!(Severity::Warning.to_string(), "warning");
    }

    #[test]
    fn test_builder() {
        let diag = Diagnostic::error("unresolved type 'Foo'")
            .code("E0102")
            .at(SourceLocation::new("a.json", 4, 2))
            .with_note("while resolving field 'x'")
            .suggest("declare 'Foo' before use");

        assert!(diag.is_error());
        assert_eq!(diag.code, Some("E0102"));
        assert_eq!(diag.location, Some(SourceLocation::new("a.json", 4, 2)));
        assert_eq!(diag.notes, vec!["while resolving field 'x'".to_string()]);
        assert_eq!(diag.help, vec!["declare 'Foo' before use".to_string()]);
    }

    #[test]
    fn test_unknown_location_ignored() {
        let diag = Diagnostic::warning("x").at(SourceLocation::default());
        assert!(diag.location.is_none());
        assert!(!diag.is_error());
    }

    #[test]
    fn test_with_file() {
        let filled = Diagnostic::error("x")
            .at(SourceLocation::new("", 3, 1))
            .with_file("main.json");
        assert_eq!(filled.location, Some(SourceLocation::new("main.json", 3, 1)));

        // 已有文件名的位置保持不变
        let kept = Diagnostic::error("x")
            .at(SourceLocation::new("m.json", 3, 1))
            .with_file("main.json");
        assert_eq!(kept.location.map(|l| l.file), Some("m.json".to_string()));

        let bare = Diagnostic::error("x").with_file("main.json");
        assert_eq!(bare.location, Some(SourceLocation::new("main.json", 0, 0)));
    }
}
