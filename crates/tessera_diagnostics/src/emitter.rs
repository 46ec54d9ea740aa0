//! Terminal Emitter
//!
//! 诊断的文本形式：
//!
//! ```text
//! error[E0105]: method 'area' not found on 'Shape'
//!   --> shapes.json:12:5
//!   = note: ...
//!   = help: ...
//! ```

use std::fmt::Write;

use colored::Colorize;

use crate::diagnostic::Diagnostic;
use crate::sink::DiagnosticSink;

/// 把诊断写到 stderr
#[derive(Debug, Clone, Copy)]
pub struct Emitter {
    colors: bool,
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Emitter {
    pub fn new() -> Self {
        Emitter { colors: true }
    }

    pub fn without_colors() -> Self {
        Emitter { colors: false }
    }

    /// 输出收集到的全部诊断和汇总行
    pub fn emit_sink(&self, sink: &DiagnosticSink) {
        eprint!("{}", self.render_sink(sink));
    }

    pub fn render_sink(&self, sink: &DiagnosticSink) -> String {
        let mut out = sink
            .diagnostics()
            .iter()
            .map(|d| self.render(d))
            .collect::<Vec<_>>()
            .join("\n");
        if let Some(summary) = sink.summary() {
            out.push('\n');
            let label = if sink.has_errors() { "error" } else { "warning" };
            let label = if self.colors {
                if sink.has_errors() {
                    label.red().bold().to_string()
                } else {
                    label.yellow().bold().to_string()
                }
            } else {
                label.to_string()
            };
            let _ = writeln!(out, "{}: {}", label, summary);
        }
        out
    }

    pub fn render(&self, diagnostic: &Diagnostic) -> String {
        let mut header = diagnostic.severity.as_str().to_string();
        if let Some(code) = diagnostic.code {
            header = format!("{}[{}]", header, code);
        }

        // 写 String 不会失败，结果直接忽略
        let mut out = String::new();
        if self.colors {
            let _ = writeln!(
                out,
                "{}: {}",
                diagnostic.severity.paint(&header),
                diagnostic.message.bold()
            );
        } else {
            let _ = writeln!(out, "{}: {}", header, diagnostic.message);
        }

        if let Some(location) = &diagnostic.location {
            let _ = writeln!(out, "  {} {}", self.gutter("-->"), location);
        }
        for note in &diagnostic.notes {
            let _ = writeln!(out, "  {} note: {}", self.gutter("="), note);
        }
        for help in &diagnostic.help {
            let line = format!("help: {}", help);
            let line = if self.colors {
                line.green().to_string()
            } else {
                line
            };
            let _ = writeln!(out, "  {} {}", self.gutter("="), line);
        }
        out
    }

    fn gutter(&self, mark: &str) -> String {
        if self.colors {
            mark.blue().bold().to_string()
        } else {
            mark.to_string()
        }
    }
}
