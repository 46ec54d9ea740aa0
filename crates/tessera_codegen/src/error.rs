//! Code Generation Error Types
//!
//! 代码生成过程中可能出现的错误。所有错误都是致命的：一次编译只报告第一个错误。

use tessera_diagnostics::Diagnostic;
use tessera_syntax::SourceLocation;
use thiserror::Error;

/// 代码生成错误
#[derive(Debug, Error)]
pub enum CodegenError {
    /// 泛型实参数量与模板参数不符
    #[error("generic argument mismatch for '{decl}': expected {expected}, got {got}")]
    GenericArity {
        decl: String,
        expected: usize,
        got: usize,
    },

    /// 在任何声明表中都找不到的类型
    #[error("unresolved type '{name}' ({context})")]
    UnresolvedType { name: String, context: String },

    /// 解析深度超过上限，通常是循环别名
    #[error("type resolution exceeded depth {depth} while resolving '{name}'")]
    TypeResolutionRecursion { name: String, depth: usize },

    /// 需要地址的位置出现了不可寻址的表达式
    #[error("expression is not addressable: {0}")]
    InvalidLValue(String),

    /// 沿继承链找不到方法
    #[error("method '{method}' not found on '{owner}' or its ancestors")]
    MissingMethod { owner: String, method: String },

    /// 结构体没有该字段
    #[error("struct '{owner}' has no field '{field}'")]
    UnknownField { owner: String, field: String },

    /// 枚举没有该变体
    #[error("enum '{owner}' has no variant '{variant}'")]
    UnknownVariant { owner: String, variant: String },

    /// 未定义的变量
    #[error("undefined variable: {0}")]
    UndefinedVariable(String),

    /// 函数未找到
    #[error("function not found: {0}")]
    UndefinedFunction(String),

    /// 循环外的 break/continue
    #[error("'{0}' outside of a loop")]
    LoopControlOutsideLoop(&'static str),

    /// 泛型模板不能直接布局或发射
    #[error("generic template '{0}' cannot be laid out without type arguments")]
    GenericTemplate(String),

    /// 不支持的降级
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// 附带源码位置的错误
    #[error("{location}: {error}")]
    Located {
        location: SourceLocation,
        #[source]
        error: Box<CodegenError>,
    },
}

impl CodegenError {
    /// 附上源码位置；已有位置或位置未知时保持不变
    pub fn at(self, location: &SourceLocation) -> Self {
        match self {
            located @ CodegenError::Located { .. } => located,
            error if location.is_unknown() => error,
            error => CodegenError::Located {
                location: location.clone(),
                error: Box::new(error),
            },
        }
    }

    /// 去掉位置包装后的错误
    pub fn root(&self) -> &CodegenError {
        match self {
            CodegenError::Located { error, .. } => error.root(),
            other => other,
        }
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            CodegenError::Located { location, .. } => Some(location),
            _ => None,
        }
    }

    /// 稳定的错误码
    pub fn code(&self) -> &'static str {
        match self.root() {
            CodegenError::GenericArity { .. } => "E0101",
            CodegenError::UnresolvedType { .. } => "E0102",
            CodegenError::TypeResolutionRecursion { .. } => "E0103",
            CodegenError::InvalidLValue(_) => "E0104",
            CodegenError::MissingMethod { .. } => "E0105",
            CodegenError::UnknownField { .. } | CodegenError::UnknownVariant { .. } => "E0106",
            CodegenError::UndefinedVariable(_) | CodegenError::UndefinedFunction(_) => "E0107",
            CodegenError::LoopControlOutsideLoop(_) => "E0108",
            CodegenError::GenericTemplate(_) => "E0109",
            CodegenError::Unsupported(_) | CodegenError::Located { .. } => "E0199",
        }
    }

    /// 转换为诊断
    pub fn to_diagnostic(&self) -> Diagnostic {
        let root = self.root();
        let mut diag = Diagnostic::error(root.to_string()).code(self.code());
        if let Some(location) = self.location() {
            diag = diag.at(location.clone());
        }
        match root {
            CodegenError::TypeResolutionRecursion { .. } => {
                diag.with_note("this usually means a type alias refers to itself")
            }
            CodegenError::GenericArity { expected, .. } => {
                diag.suggest(format!("provide exactly {} type argument(s)", expected))
            }
            _ => diag,
        }
    }
}

/// 代码生成结果类型
pub type CodegenResult<T> = Result<T, CodegenError>;
