//! Runtime Support
//!
//! 生成代码依赖的 C 运行时函数声明，以及内置的 panic 例程

use crate::context::CodegenContext;

pub const MALLOC: &str = "malloc";
pub const FREE: &str = "free";
pub const PRINTF: &str = "printf";
pub const EXIT: &str = "exit";
/// 打印消息后以状态 1 退出
pub const PANIC: &str = "__tessera_panic";

/// 注入运行时声明与 panic 定义
pub fn inject_runtime(ctx: &mut CodegenContext) {
    ctx.declare_function(MALLOC, "declare i8* @malloc(i64)".to_string());
    ctx.declare_function(FREE, "declare void @free(i8*)".to_string());
    ctx.declare_function(PRINTF, "declare i32 @printf(i8*, ...)".to_string());
    ctx.declare_function(EXIT, "declare void @exit(i32)".to_string());

    let format = ctx.string_pointer("panic: %s\n");
    let mut body = String::new();
    body.push_str(&format!("define void @{}(i8* %msg) {{\n", PANIC));
    body.push_str("entry:\n");
    body.push_str(&format!(
        "  %0 = call i32 (i8*, ...) @printf(i8* {}, i8* %msg)\n",
        format
    ));
    body.push_str("  call void @exit(i32 1)\n");
    body.push_str("  unreachable\n");
    body.push_str("}\n");
    ctx.function_defs.push(body);
    ctx.emitted_functions.insert(PANIC.to_string());
}
