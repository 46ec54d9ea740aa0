//! Compilation Errors
//!
//! 驱动层的错误类型，集成统一诊断系统

use tessera_codegen::CodegenError;
use tessera_diagnostics::{Diagnostic, DiagnosticSink, Emitter};
use thiserror::Error;

/// 编译错误
#[derive(Debug, Error)]
pub enum CompileError {
    /// 代码生成错误
    #[error("Code generation error: {0}")]
    Codegen(#[from] CodegenError),

    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 模块 JSON 无法解析
    #[error("Invalid module JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// 下游编译器失败
    #[error("'{command}' exited with {status}:\n{stderr}")]
    Toolchain {
        command: String,
        status: String,
        stderr: String,
    },
}

impl CompileError {
    /// 转换为诊断并收集到 DiagnosticSink
    pub fn collect_to_sink(&self, sink: &mut DiagnosticSink, file_path: Option<&str>) {
        let diag = match self {
            CompileError::Codegen(err) => err.to_diagnostic(),
            CompileError::Io(err) => Diagnostic::error(format!("IO error: {}", err)),
            CompileError::Json(err) => {
                let mut diag = Diagnostic::error(format!("invalid module JSON: {}", err));
                if err.line() > 0 {
                    diag = diag.with_note(format!(
                        "at line {}, column {} of the input",
                        err.line(),
                        err.column()
                    ));
                }
                diag
            }
            CompileError::Toolchain {
                command,
                status,
                stderr,
            } => {
                let diag = Diagnostic::error(format!("'{}' exited with {}", command, status));
                stderr
                    .lines()
                    .filter(|line| !line.trim().is_empty())
                    .fold(diag, |diag, line| diag.with_note(line.to_string()))
            }
        };
        match file_path {
            Some(path) => sink.add(diag.with_file(path)),
            None => sink.add(diag),
        }
    }

    /// 使用统一诊断系统输出错误
    pub fn emit(&self, file_path: Option<&str>) {
        let mut sink = DiagnosticSink::new();
        self.collect_to_sink(&mut sink, file_path);
        Emitter::new().emit_sink(&sink);
    }
}

/// 编译结果类型
pub type CompileResult<T> = Result<T, CompileError>;
