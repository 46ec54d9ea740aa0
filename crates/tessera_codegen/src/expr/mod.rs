//! Expression Code Generation
//!
//! 表达式代码生成的主入口，将职责分散到各个子模块

mod binary;
mod call;
mod closure;
mod conversion;
mod enum_expr;
mod literal;
mod method_call;
mod struct_access;
mod struct_init;

use tessera_syntax::{Expr, ExprKind, TypeRef, UnaryOp};

use crate::error::{CodegenError, CodegenResult};
use crate::function::FunctionGenerator;
use crate::ir::{CodegenValue, IrType};

/// 可寻址位置：指针与指向的类型
#[derive(Debug, Clone)]
pub(crate) struct Place {
    pub ptr: String,
    pub ty: IrType,
}

impl FunctionGenerator<'_> {
    /// 生成表达式代码（主分发方法）
    pub(crate) fn generate_expr(&mut self, expr: &Expr) -> CodegenResult<CodegenValue> {
        match &expr.kind {
            ExprKind::Literal(lit) => self.gen_literal(lit, &expr.ty),
            ExprKind::Variable(name) => self.gen_variable(name),
            ExprKind::Binary { op, lhs, rhs } => self.gen_binary(*op, lhs, rhs, &expr.ty),
            ExprKind::Unary { op, operand } => self.gen_unary(*op, operand, &expr.ty),
            ExprKind::Assign { target, value } => self.gen_assign(target, value),
            ExprKind::Call {
                callee,
                generic_args,
                args,
            } => self.gen_call(callee, generic_args, args, &expr.ty),
            ExprKind::MethodCall {
                receiver,
                method,
                generic_args,
                args,
            } => self.gen_method_call(receiver, method, generic_args, args),
            ExprKind::StaticCall {
                owner,
                method,
                generic_args,
                args,
            } => self.gen_static_call(owner, method, generic_args, args),
            ExprKind::ClosureCall { callee, args } => self.gen_closure_call(callee, args, &expr.ty),
            ExprKind::FunctionRef { name, generic_args } => {
                self.gen_function_ref(name, generic_args)
            }
            ExprKind::Member { .. } | ExprKind::Index { .. } | ExprKind::TupleIndex { .. } => {
                let place = self.address_of(expr, true)?;
                let value = self.load(&place.ty, &place.ptr);
                Ok(CodegenValue::new(value, place.ty))
            }
            ExprKind::StructLiteral { fields } => self.gen_struct_literal(fields, &expr.ty),
            ExprKind::TupleLiteral(elems) => self.gen_tuple_literal(elems),
            ExprKind::ArrayLiteral(elems) => self.gen_array_literal(elems, &expr.ty),
            ExprKind::EnumVariant { variant, args } => {
                self.gen_enum_variant(variant, args, &expr.ty)
            }
            ExprKind::Match { scrutinee, arms } => self.gen_match(scrutinee, arms, &expr.ty),
            ExprKind::Lambda {
                params,
                body,
                captures,
            } => self.gen_lambda(params, body, captures, expr),
            ExprKind::Ternary {
                condition,
                then_value,
                else_value,
            } => self.gen_ternary(condition, then_value, else_value, &expr.ty),
            ExprKind::Cast { value } => self.gen_cast(value, &expr.ty),
            ExprKind::Sizeof(ty) => self.gen_sizeof(ty),
        }
    }

    fn gen_variable(&mut self, name: &str) -> CodegenResult<CodegenValue> {
        if let Some(local) = self.locals.get(name).cloned() {
            let value = self.load(&local.ir, &local.ptr);
            return Ok(CodegenValue::new(value, local.ir));
        }
        // 不是局部变量时按函数引用处理
        if self.ctx.functions.contains_key(name) {
            return self.gen_function_ref(name, &[]);
        }
        Err(CodegenError::UndefinedVariable(name.to_string()))
    }

    fn gen_assign(&mut self, target: &Expr, value: &Expr) -> CodegenResult<CodegenValue> {
        let place = self.address_of(target, false)?;
        let value = self.generate_expr(value)?;
        let value = self.coerce(value, &target.ty, &place.ty)?;
        self.store(&value, &place.ptr);
        Ok(value)
    }

    /// 表达式的地址
    ///
    /// `materialize` 为 true 时，不可寻址的值先存入临时栈槽；否则报 `InvalidLValue`
    pub(crate) fn address_of(&mut self, expr: &Expr, materialize: bool) -> CodegenResult<Place> {
        match &expr.kind {
            ExprKind::Variable(name) => match self.locals.get(name).cloned() {
                Some(local) => Ok(Place {
                    ptr: local.ptr,
                    ty: local.ir,
                }),
                None if materialize => self.materialize(expr),
                None => Err(CodegenError::InvalidLValue(format!(
                    "'{}' is not a local variable",
                    name
                ))),
            },
            ExprKind::Member { object, field } => self.member_place(object, field),
            ExprKind::Index { object, index } => self.index_place(object, index),
            ExprKind::TupleIndex { object, index } => self.tuple_place(object, *index),
            ExprKind::Unary {
                op: UnaryOp::Deref,
                operand,
            } => {
                let pointer = self.generate_expr(operand)?;
                let ty = pointer.ty.pointee().cloned().ok_or_else(|| {
                    CodegenError::InvalidLValue(format!("dereference of '{}'", pointer.ty))
                })?;
                Ok(Place {
                    ptr: pointer.value,
                    ty,
                })
            }
            _ if materialize => self.materialize(expr),
            _ => Err(CodegenError::InvalidLValue(describe(expr))),
        }
    }

    /// 计算值并放入临时栈槽
    fn materialize(&mut self, expr: &Expr) -> CodegenResult<Place> {
        let value = self.generate_expr(expr)?;
        if value.ty.is_void() {
            return Err(CodegenError::InvalidLValue(describe(expr)));
        }
        let slot = self.alloca(&value.ty);
        self.store(&value, &slot);
        Ok(Place {
            ptr: slot,
            ty: value.ty,
        })
    }

    /// 聚合值的地址；指向聚合的指针直接使用其值
    pub(crate) fn aggregate_base(&mut self, object: &Expr) -> CodegenResult<Place> {
        let object_ty = self.resolve(&object.ty)?;
        match object_ty {
            IrType::Ptr(inner) if inner.is_aggregate() => {
                let pointer = self.generate_expr(object)?;
                Ok(Place {
                    ptr: pointer.value,
                    ty: *inner,
                })
            }
            _ => self.address_of(object, true),
        }
    }

    /// 把值转换为目标类型；类型相同时原样返回
    pub(crate) fn coerce(
        &mut self,
        value: CodegenValue,
        source: &TypeRef,
        target: &IrType,
    ) -> CodegenResult<CodegenValue> {
        if &value.ty == target || target.is_void() {
            return Ok(value);
        }
        if value.value == "null" && target.is_pointer() {
            return Ok(CodegenValue::new("null", target.clone()));
        }
        // null 结构体：全零，存活标志为 0
        if value.value == "null" && matches!(target, IrType::Struct(_)) {
            return Ok(CodegenValue::new("zeroinitializer", target.clone()));
        }
        let unsigned = self.concrete(source).is_unsigned();
        self.convert(value, target, unsigned, unsigned)
    }
}

fn describe(expr: &Expr) -> String {
    let what = match &expr.kind {
        ExprKind::Literal(_) => "literal",
        ExprKind::Call { .. }
        | ExprKind::MethodCall { .. }
        | ExprKind::StaticCall { .. }
        | ExprKind::ClosureCall { .. } => "call result",
        ExprKind::Binary { .. } | ExprKind::Unary { .. } => "operator result",
        ExprKind::Lambda { .. } => "lambda",
        _ => "temporary value",
    };
    format!("cannot take the address of a {} of type '{}'", what, expr.ty)
}
