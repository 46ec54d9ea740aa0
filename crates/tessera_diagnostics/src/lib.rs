//! Tessera Diagnostics
//!
//! 代码生成与驱动层错误的统一报告格式。错误先转换成 [`Diagnostic`]，
//! 收集进 [`DiagnosticSink`]，最后由 [`Emitter`] 写到终端。
//!
//! ```rust
//! use tessera_diagnostics::{Diagnostic, DiagnosticSink, Emitter};
//! use tessera_syntax::SourceLocation;
//!
//! let mut sink = DiagnosticSink::new();
//! sink.add(
//!     Diagnostic::error("generic argument mismatch for 'Pair'")
//!         .code("E0101")
//!         .at(SourceLocation::new("main.json", 3, 9))
//!         .suggest("provide exactly 2 type argument(s)"),
//! );
//!
//! let text = Emitter::without_colors().render_sink(&sink);
//! assert!(text.contains("--> main.json:3:9"));
//! assert!(text.ends_with("could not generate IR due to 1 error\n"));
//! ```

pub mod diagnostic;
pub mod emitter;
pub mod sink;

pub use diagnostic::{Diagnostic, Severity};
pub use emitter::Emitter;
pub use sink::DiagnosticSink;
