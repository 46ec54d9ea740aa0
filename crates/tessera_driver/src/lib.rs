//! Tessera Compiler Driver
//!
//! 编译器驱动：加载类型检查后的模块，生成 IR，并把 IR 交给下游编译器

pub mod error;

pub use error::{CompileError, CompileResult};

use std::io::Write;
use std::path::Path;
use std::process::Command;

use tessera_codegen::{compile_to_context, CodegenContext, CodegenOptions};
use tessera_monomorph::MonomorphizationRecord;
use tessera_syntax::{Decl, Module};
use tracing::{debug, info};

/// 覆盖下游编译器的环境变量
pub const CC_ENV: &str = "TESSERA_CC";
/// 默认的下游编译器
pub const DEFAULT_CC: &str = "clang";

/// 编译选项
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub target_triple: Option<String>,
    pub debug_info: bool,
    /// 把 `.ll` 编译为可执行文件的命令
    pub cc: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            target_triple: None,
            debug_info: false,
            cc: std::env::var(CC_ENV).unwrap_or_else(|_| DEFAULT_CC.to_string()),
        }
    }
}

impl CompileOptions {
    fn codegen_options(&self, module: &Module) -> CodegenOptions {
        CodegenOptions {
            module_name: module.name.clone(),
            target_triple: self.target_triple.clone(),
            debug_info: self.debug_info,
        }
    }
}

/// 编译结果
#[derive(Debug)]
pub struct CompilationOutput {
    /// 生成的 IR 文本
    pub ir: String,
    /// 本次编译产生的单态化实例（按请求顺序）
    pub instantiations: Vec<MonomorphizationRecord>,
    /// 警告信息
    pub warnings: Vec<String>,
}

/// 编译内存中的模块
pub fn compile_module(module: &Module, options: &CompileOptions) -> CompileResult<CompilationOutput> {
    info!(module = %module.name, "generating IR");
    let mut warnings = Vec::new();
    if options.debug_info {
        warnings.push("debug metadata requested but no collector is installed".to_string());
    }
    let has_main = module
        .decls
        .iter()
        .any(|decl| matches!(decl, Decl::Function(f) if f.name == "main"));
    if !has_main {
        warnings.push(format!("module '{}' has no 'main' function", module.name));
    }

    let ctx = compile_to_context(module, CodegenContext::new(options.codegen_options(module)))?;
    let instantiations: Vec<_> = ctx.instances().iter().cloned().collect();
    debug!(instances = instantiations.len(), "codegen finished");

    Ok(CompilationOutput {
        ir: ctx.finish(),
        instantiations,
        warnings,
    })
}

/// 从 JSON 文本加载模块
pub fn load_module_from_str(json: &str) -> CompileResult<Module> {
    Ok(serde_json::from_str(json)?)
}

/// 从 JSON 文件加载模块
pub fn load_module(path: impl AsRef<Path>) -> CompileResult<Module> {
    let path = path.as_ref();
    info!(path = %path.display(), "loading module");
    let json = std::fs::read_to_string(path)?;
    load_module_from_str(&json)
}

/// 从文件编译
pub fn compile_file(path: impl AsRef<Path>, options: &CompileOptions) -> CompileResult<CompilationOutput> {
    let module = load_module(path)?;
    compile_module(&module, options)
}

/// 把 IR 写入临时 `.ll` 文件并调用下游编译器生成可执行文件
pub fn build_executable(ir: &str, output: impl AsRef<Path>, options: &CompileOptions) -> CompileResult<()> {
    let mut ll = tempfile::Builder::new()
        .prefix("tessera_")
        .suffix(".ll")
        .tempfile()?;
    ll.write_all(ir.as_bytes())?;
    ll.flush()?;

    let mut cmd = Command::new(&options.cc);
    cmd.arg(ll.path()).arg("-o").arg(output.as_ref());
    if let Some(triple) = &options.target_triple {
        cmd.arg(format!("--target={}", triple));
    }
    info!(cc = %options.cc, output = %output.as_ref().display(), "invoking downstream compiler");

    let result = cmd.output()?;
    if !result.status.success() {
        return Err(CompileError::Toolchain {
            command: options.cc.clone(),
            status: result.status.to_string(),
            stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
        });
    }
    Ok(())
}
