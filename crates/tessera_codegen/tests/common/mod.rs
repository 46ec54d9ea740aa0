//! 集成测试共用的 AST 构造函数

#![allow(dead_code)]

use tessera_codegen::{compile_to_ir, CodegenOptions};
use tessera_syntax::*;

pub fn compile(decls: Vec<Decl>) -> String {
    let module = Module::new("test", decls);
    match compile_to_ir(&module, CodegenOptions::new("test")) {
        Ok(ir) => ir,
        Err(e) => panic!("compilation failed: {}", e),
    }
}

pub fn int() -> TypeRef {
    TypeRef::named("int")
}

pub fn main_fn(body: Vec<Stmt>) -> Decl {
    Decl::Function(FunctionDecl::new("main", vec![], int()).with_body(body))
}

pub fn method(name: &str, ret: TypeRef, body: Vec<Stmt>) -> FunctionDecl {
    FunctionDecl::new(name, vec![], ret).with_body(body)
}

pub fn this_of(owner: &str) -> Expr {
    Expr::var("this", TypeRef::pointer(TypeRef::named(owner), 1))
}

pub fn struct_lit(ty: TypeRef, fields: Vec<(&str, Expr)>) -> Expr {
    Expr::new(
        ExprKind::StructLiteral {
            fields: fields
                .into_iter()
                .map(|(name, value)| FieldInit {
                    name: name.to_string(),
                    value,
                })
                .collect(),
        },
        ty,
    )
}

pub fn generic_call(callee: &str, generic_args: Vec<TypeRef>, args: Vec<Expr>, ty: TypeRef) -> Expr {
    Expr::new(
        ExprKind::Call {
            callee: callee.to_string(),
            generic_args,
            args,
        },
        ty,
    )
}

pub fn expr_stmt(expr: Expr) -> Stmt {
    Stmt::Expr(expr)
}

/// 函数定义在 IR 文本中的位置
pub fn define_pos(ir: &str, symbol: &str) -> usize {
    let needle = format!(" @{}(", symbol);
    ir.lines()
        .scan(0usize, |offset, line| {
            let start = *offset;
            *offset += line.len() + 1;
            Some((start, line))
        })
        .find(|(_, line)| line.starts_with("define ") && line.contains(&needle))
        .map(|(start, _)| start)
        .unwrap_or_else(|| panic!("no definition of @{} in:\n{}", symbol, ir))
}
