//! Binary and Unary Operators
//!
//! `&&`/`||` 与三元表达式按分支求值，用 phi 合并；有无符号取自左操作数的源类型。
//! 结构体值与 `null` 比较时读存活标志

use tessera_syntax::{BinaryOp, Expr, TypeRef, UnaryOp};

use crate::error::{CodegenError, CodegenResult};
use crate::function::FunctionGenerator;
use crate::ir::{CodegenValue, IrType};

impl FunctionGenerator<'_> {
    pub(crate) fn gen_binary(
        &mut self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        result_ty: &TypeRef,
    ) -> CodegenResult<CodegenValue> {
        if matches!(op, BinaryOp::And | BinaryOp::Or) {
            return self.gen_short_circuit(op, lhs, rhs);
        }

        let left = self.generate_expr(lhs)?;
        let right = self.generate_expr(rhs)?;
        if matches!(op, BinaryOp::Eq | BinaryOp::Ne) {
            if let Some(result) = self.compare_liveness(op, &left, &right)? {
                return Ok(result);
            }
        }
        let right = self.coerce(right, &rhs.ty, &left.ty)?;
        let unsigned = self.concrete(&lhs.ty).is_unsigned();

        let reg = self.reg();
        if op.is_comparison() {
            let inst = match &left.ty {
                t if t.is_float() => format!("fcmp {}", float_predicate(op)),
                IrType::Int(_) | IrType::Ptr(_) => format!("icmp {}", int_predicate(op, unsigned)),
                other => {
                    return Err(CodegenError::Unsupported(format!(
                        "comparison of '{}'",
                        other
                    )))
                }
            };
            self.emit(format!(
                "{} = {} {}, {}",
                reg,
                inst,
                left.typed(),
                right.value
            ));
            return Ok(CodegenValue::new(reg, IrType::i1()));
        }

        let inst = if left.ty.is_float() {
            float_op(op)?
        } else if left.ty.is_int() {
            int_op(op, unsigned)?
        } else {
            return Err(CodegenError::Unsupported(format!(
                "operator {:?} on '{}'",
                op, left.ty
            )));
        };
        self.emit(format!("{} = {} {}, {}", reg, inst, left.typed(), right.value));
        let value = CodegenValue::new(reg, left.ty.clone());
        let target = self.resolve(result_ty)?;
        self.coerce(value, &lhs.ty, &target)
    }

    /// `s == null` / `s != null`：取出结构体值的存活标志与 0 比较
    fn compare_liveness(
        &mut self,
        op: BinaryOp,
        left: &CodegenValue,
        right: &CodegenValue,
    ) -> CodegenResult<Option<CodegenValue>> {
        let subject = match (&left.ty, &right.ty) {
            (IrType::Struct(_), _) if right.value == "null" => left,
            (_, IrType::Struct(_)) if left.value == "null" => right,
            _ => return Ok(None),
        };
        let IrType::Struct(name) = &subject.ty else {
            return Ok(None);
        };
        let slot = self.ctx.struct_layout(name)?.liveness_slot();

        let bit = self.reg();
        self.emit(format!("{} = extractvalue {}, {}", bit, subject.typed(), slot));
        let predicate = if op == BinaryOp::Eq { "eq" } else { "ne" };
        let reg = self.reg();
        self.emit(format!("{} = icmp {} i1 {}, false", reg, predicate, bit));
        Ok(Some(CodegenValue::new(reg, IrType::i1())))
    }

    fn gen_short_circuit(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> CodegenResult<CodegenValue> {
        let prefix = if op == BinaryOp::And { "and" } else { "or" };
        let rhs_label = self.label(&format!("{}.rhs", prefix));
        let end_label = self.label(&format!("{}.end", prefix));

        let left = self.generate_condition(lhs)?;
        let left_block = self.current_block.clone();
        let (on_true, on_false) = if op == BinaryOp::And {
            (&rhs_label, &end_label)
        } else {
            (&end_label, &rhs_label)
        };
        self.terminate(format!(
            "br i1 {}, label %{}, label %{}",
            left, on_true, on_false
        ));

        self.start_block(&rhs_label);
        let right = self.generate_condition(rhs)?;
        let right_block = self.current_block.clone();
        self.terminate(format!("br label %{}", end_label));

        self.start_block(&end_label);
        let short = if op == BinaryOp::And { "false" } else { "true" };
        let reg = self.reg();
        self.emit(format!(
            "{} = phi i1 [ {}, %{} ], [ {}, %{} ]",
            reg, short, left_block, right, right_block
        ));
        Ok(CodegenValue::new(reg, IrType::i1()))
    }

    pub(crate) fn gen_ternary(
        &mut self,
        condition: &Expr,
        then_value: &Expr,
        else_value: &Expr,
        result_ty: &TypeRef,
    ) -> CodegenResult<CodegenValue> {
        let result_ir = self.resolve(result_ty)?;
        let cond = self.generate_condition(condition)?;
        let then_label = self.label("ternary.then");
        let else_label = self.label("ternary.else");
        let end_label = self.label("ternary.end");
        self.terminate(format!(
            "br i1 {}, label %{}, label %{}",
            cond, then_label, else_label
        ));

        // 前驱块在发射 br 之后读取：分支体终结时 br 落在新开的块里
        self.start_block(&then_label);
        let then_result = self.generate_expr(then_value)?;
        let then_result = self.coerce(then_result, &then_value.ty, &result_ir)?;
        self.terminate(format!("br label %{}", end_label));
        let then_block = self.current_block.clone();

        self.start_block(&else_label);
        let else_result = self.generate_expr(else_value)?;
        let else_result = self.coerce(else_result, &else_value.ty, &result_ir)?;
        self.terminate(format!("br label %{}", end_label));
        let else_block = self.current_block.clone();

        self.start_block(&end_label);
        if result_ir.is_void() {
            return Ok(CodegenValue::void());
        }
        let reg = self.reg();
        self.emit(format!(
            "{} = phi {} [ {}, %{} ], [ {}, %{} ]",
            reg, result_ir, then_result.value, then_block, else_result.value, else_block
        ));
        Ok(CodegenValue::new(reg, result_ir))
    }

    pub(crate) fn gen_unary(
        &mut self,
        op: UnaryOp,
        operand: &Expr,
        result_ty: &TypeRef,
    ) -> CodegenResult<CodegenValue> {
        match op {
            UnaryOp::AddressOf => {
                let place = self.address_of(operand, false)?;
                Ok(CodegenValue::new(place.ptr, place.ty.ptr_to()))
            }
            UnaryOp::Deref => {
                let pointer = self.generate_expr(operand)?;
                let pointee = match pointer.ty.pointee() {
                    Some(inner) => inner.clone(),
                    None => self.resolve(result_ty)?,
                };
                let value = self.load(&pointee, &pointer.value);
                Ok(CodegenValue::new(value, pointee))
            }
            UnaryOp::Neg => {
                let value = self.generate_expr(operand)?;
                let reg = self.reg();
                if value.ty.is_float() {
                    self.emit(format!("{} = fneg {}", reg, value.typed()));
                } else {
                    self.emit(format!("{} = sub {} 0, {}", reg, value.ty, value.value));
                }
                Ok(CodegenValue::new(reg, value.ty))
            }
            UnaryOp::Not => {
                let value = self.generate_expr(operand)?;
                let mask = if value.ty == IrType::i1() { "true" } else { "-1" };
                let reg = self.reg();
                self.emit(format!("{} = xor {}, {}", reg, value.typed(), mask));
                Ok(CodegenValue::new(reg, value.ty))
            }
        }
    }
}

fn int_op(op: BinaryOp, unsigned: bool) -> CodegenResult<&'static str> {
    Ok(match op {
        BinaryOp::Add => "add",
        BinaryOp::Sub => "sub",
        BinaryOp::Mul => "mul",
        BinaryOp::Div if unsigned => "udiv",
        BinaryOp::Div => "sdiv",
        BinaryOp::Rem if unsigned => "urem",
        BinaryOp::Rem => "srem",
        BinaryOp::BitAnd => "and",
        BinaryOp::BitOr => "or",
        BinaryOp::BitXor => "xor",
        BinaryOp::Shl => "shl",
        BinaryOp::Shr if unsigned => "lshr",
        BinaryOp::Shr => "ashr",
        other => {
            return Err(CodegenError::Unsupported(format!(
                "integer operator {:?}",
                other
            )))
        }
    })
}

fn float_op(op: BinaryOp) -> CodegenResult<&'static str> {
    Ok(match op {
        BinaryOp::Add => "fadd",
        BinaryOp::Sub => "fsub",
        BinaryOp::Mul => "fmul",
        BinaryOp::Div => "fdiv",
        BinaryOp::Rem => "frem",
        other => {
            return Err(CodegenError::Unsupported(format!(
                "floating-point operator {:?}",
                other
            )))
        }
    })
}

fn int_predicate(op: BinaryOp, unsigned: bool) -> &'static str {
    match (op, unsigned) {
        (BinaryOp::Eq, _) => "eq",
        (BinaryOp::Ne, _) => "ne",
        (BinaryOp::Lt, true) => "ult",
        (BinaryOp::Lt, false) => "slt",
        (BinaryOp::Le, true) => "ule",
        (BinaryOp::Le, false) => "sle",
        (BinaryOp::Gt, true) => "ugt",
        (BinaryOp::Gt, false) => "sgt",
        (BinaryOp::Ge, true) => "uge",
        _ => "sge",
    }
}

fn float_predicate(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Eq => "oeq",
        BinaryOp::Ne => "one",
        BinaryOp::Lt => "olt",
        BinaryOp::Le => "ole",
        BinaryOp::Gt => "ogt",
        _ => "oge",
    }
}
