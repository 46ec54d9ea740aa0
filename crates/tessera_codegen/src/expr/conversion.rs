//! Casts and sizeof

use tessera_syntax::{Expr, TypeRef};

use crate::error::{CodegenError, CodegenResult};
use crate::function::FunctionGenerator;
use crate::ir::{CodegenValue, IrType};

impl FunctionGenerator<'_> {
    /// 显式转换到 `target`
    pub(crate) fn gen_cast(&mut self, value: &Expr, target: &TypeRef) -> CodegenResult<CodegenValue> {
        let source_unsigned = self.concrete(&value.ty).is_unsigned();
        let target_unsigned = self.concrete(target).is_unsigned();
        let target = self.resolve(target)?;
        let value = self.generate_expr(value)?;
        self.convert(value, &target, source_unsigned, target_unsigned)
    }

    /// `sizeof(T)`：布局计算得到的 i64 常量
    pub(crate) fn gen_sizeof(&mut self, ty: &TypeRef) -> CodegenResult<CodegenValue> {
        let ir = self.resolve(ty)?;
        let size = self.ctx.size_of(&ir)?;
        Ok(CodegenValue::new(size.to_string(), IrType::i64()))
    }

    /// 选择转换指令
    pub(crate) fn convert(
        &mut self,
        value: CodegenValue,
        target: &IrType,
        source_unsigned: bool,
        target_unsigned: bool,
    ) -> CodegenResult<CodegenValue> {
        if &value.ty == target {
            return Ok(value);
        }
        let op = match (&value.ty, target) {
            (IrType::Int(from), IrType::Int(to)) if from > to => "trunc",
            (IrType::Int(1), IrType::Int(_)) => "zext",
            (IrType::Int(_), IrType::Int(_)) if source_unsigned => "zext",
            (IrType::Int(_), IrType::Int(_)) => "sext",
            (IrType::Int(_), t) if t.is_float() && source_unsigned => "uitofp",
            (IrType::Int(_), t) if t.is_float() => "sitofp",
            (f, IrType::Int(_)) if f.is_float() && target_unsigned => "fptoui",
            (f, IrType::Int(_)) if f.is_float() => "fptosi",
            (IrType::Float, IrType::Double) => "fpext",
            (IrType::Double, IrType::Float) => "fptrunc",
            (IrType::Ptr(_), IrType::Ptr(_)) => "bitcast",
            (IrType::Ptr(_), IrType::Int(_)) => "ptrtoint",
            (IrType::Int(_), IrType::Ptr(_)) => "inttoptr",
            (from, to) => {
                return Err(CodegenError::Unsupported(format!(
                    "conversion from '{}' to '{}'",
                    from, to
                )))
            }
        };
        let reg = self.reg();
        self.emit(format!("{} = {} {} to {}", reg, op, value.typed(), target));
        Ok(CodegenValue::new(reg, target.clone()))
    }
}
