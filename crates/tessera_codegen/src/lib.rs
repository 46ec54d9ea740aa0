//! Tessera Code Generation
//!
//! 把类型检查后的 Tessera 模块降级为文本形式的 LLVM 风格 IR
//!
//! # 架构
//!
//! - `error.rs` - 错误类型定义
//! - `context.rs` - 编译会话：声明表、缓存、输出段
//! - `ir.rs` - 目标类型与值
//! - `types.rs` - 类型解析
//! - `layout.rs` - 结构体/枚举布局
//! - `vtable.rs` - 虚表构建
//! - `monomorph.rs` - 单态化编排
//! - `runtime.rs` - 运行时声明
//! - `expr/` - 表达式代码生成
//! - `stmt.rs` - 语句代码生成
//! - `function.rs` - 函数代码生成
//! - `module.rs` - 模块代码生成与延迟生成队列
//! - `debug.rs` - 调试元数据接口

pub mod context;
pub mod debug;
pub mod error;
pub mod expr;
pub mod function;
pub mod ir;
pub mod layout;
pub mod module;
pub mod monomorph;
pub mod runtime;
pub mod stmt;
pub mod types;
pub mod vtable;

// 重新导出核心类型
pub use context::{CodegenContext, CodegenOptions};
pub use debug::{DebugInfoSink, DebugMember, DwarfEncoding};
pub use error::{CodegenError, CodegenResult};
pub use ir::{CodegenValue, IrType};
pub use layout::{EnumLayout, StructLayout, VariantLayout};
pub use module::ModuleGenerator;

use tessera_syntax::Module;
use tracing::debug;

/// 编译模块为 IR 文本
pub fn compile_to_ir(module: &Module, options: CodegenOptions) -> CodegenResult<String> {
    let ctx = compile_to_context(module, CodegenContext::new(options))?;
    Ok(finish(&ctx))
}

/// 带调试信息收集器编译
pub fn compile_with_debug_sink(
    module: &Module,
    options: CodegenOptions,
    sink: Box<dyn DebugInfoSink>,
) -> CodegenResult<String> {
    let ctx = CodegenContext::new(options).with_debug_sink(sink);
    let ctx = compile_to_context(module, ctx)?;
    Ok(finish(&ctx))
}

/// 编译并返回会话本身（用于检查布局、虚表和单态化记录）
pub fn compile_to_context(
    module: &Module,
    mut ctx: CodegenContext,
) -> CodegenResult<CodegenContext> {
    debug!(module = %module.name, decls = module.decls.len(), "codegen start");
    let mut module_gen = ModuleGenerator::new(&mut ctx);
    module_gen.generate(module)?;
    Ok(ctx)
}

fn finish(ctx: &CodegenContext) -> String {
    let ir = ctx.finish();
    debug!(
        functions = ctx.function_defs.len(),
        instances = ctx.instances.len(),
        "codegen done"
    );
    ir
}
