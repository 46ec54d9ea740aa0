//! Diagnostic Sink

use crate::diagnostic::{Diagnostic, Severity};

/// 按报告顺序收集诊断，并统计错误与警告数
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
    errors: usize,
    warnings: usize,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => self.errors += 1,
            Severity::Warning => self.warnings += 1,
            Severity::Note => {}
        }
        self.diagnostics.push(diagnostic);
    }

    /// 以警告形式记录一条驱动层消息
    pub fn warn(&mut self, message: impl Into<String>) {
        self.add(Diagnostic::warning(message));
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn warning_count(&self) -> usize {
        self.warnings
    }

    pub fn first_error(&self) -> Option<&Diagnostic> {
        self.diagnostics.iter().find(|d| d.is_error())
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// 末尾的汇总行；没有错误和警告时为 None
    pub fn summary(&self) -> Option<String> {
        let plural = |n: usize, word: &str| {
            if n == 1 {
                format!("1 {}", word)
            } else {
                format!("{} {}s", n, word)
            }
        };
        match (self.errors, self.warnings) {
            (0, 0) => None,
            (0, w) => Some(format!("generated {}", plural(w, "warning"))),
            (e, 0) => Some(format!("could not generate IR due to {}", plural(e, "error"))),
            (e, w) => Some(format!(
                "could not generate IR due to {}; {} emitted",
                plural(e, "error"),
                plural(w, "warning")
            )),
        }
    }
}
