//! Struct, Tuple and Array Literals
//!
//! 从 zeroinitializer 开始逐个 insertvalue；未给出的字段保持零值。

use tessera_syntax::{Expr, FieldInit, TypeRef};

use crate::error::{CodegenError, CodegenResult};
use crate::function::FunctionGenerator;
use crate::ir::{CodegenValue, IrType};
use crate::layout::{LIVENESS_FIELD, VTABLE_FIELD};
use crate::vtable::vtable_global;

impl FunctionGenerator<'_> {
    pub(crate) fn gen_struct_literal(
        &mut self,
        fields: &[FieldInit],
        ty: &TypeRef,
    ) -> CodegenResult<CodegenValue> {
        let struct_ty = self.resolve(ty)?;
        let name = match &struct_ty {
            IrType::Struct(name) => name.clone(),
            other => {
                return Err(CodegenError::Unsupported(format!(
                    "struct literal of type '{}'",
                    other
                )))
            }
        };
        let layout = self.ctx.struct_layout(&name)?;

        let mut current = "zeroinitializer".to_string();
        if let Some(slot) = layout.vtable_slot() {
            let vtable_len = self.ctx.vtable_layout(&name)?.len();
            let vtable = format!(
                "bitcast ([{} x i8*]* {} to i8*)",
                vtable_len,
                vtable_global(&name)
            );
            current = self.insert(&struct_ty, &current, &format!("i8* {}", vtable), slot);
        }

        for init in fields {
            if init.name == VTABLE_FIELD || init.name == LIVENESS_FIELD {
                return Err(CodegenError::UnknownField {
                    owner: name,
                    field: init.name.clone(),
                });
            }
            let slot = layout
                .slot(&init.name)
                .ok_or_else(|| CodegenError::UnknownField {
                    owner: name.clone(),
                    field: init.name.clone(),
                })?;
            let field_ty = layout.field_types()[slot].clone();
            let value = self.generate_expr(&init.value)?;
            let value = self.coerce(value, &init.value.ty, &field_ty)?;
            current = self.insert(&struct_ty, &current, &value.typed(), slot);
        }

        // 存活标志
        current = self.insert(&struct_ty, &current, "i1 1", layout.liveness_slot());
        Ok(CodegenValue::new(current, struct_ty))
    }

    pub(crate) fn gen_tuple_literal(&mut self, elems: &[Expr]) -> CodegenResult<CodegenValue> {
        let mut values = Vec::with_capacity(elems.len());
        for elem in elems {
            values.push(self.generate_expr(elem)?);
        }
        let tuple_ty = IrType::Anon(values.iter().map(|v| v.ty.clone()).collect());
        let mut current = "undef".to_string();
        for (i, value) in values.iter().enumerate() {
            current = self.insert(&tuple_ty, &current, &value.typed(), i);
        }
        if values.is_empty() {
            current = "zeroinitializer".to_string();
        }
        Ok(CodegenValue::new(current, tuple_ty))
    }

    /// `[a, b, c]`：元素个数必须与数组类型的长度一致
    pub(crate) fn gen_array_literal(
        &mut self,
        elems: &[Expr],
        ty: &TypeRef,
    ) -> CodegenResult<CodegenValue> {
        let array_ty = self.resolve(ty)?;
        let elem_ty = match &array_ty {
            IrType::Array(len, elem) if *len == elems.len() as u64 => (**elem).clone(),
            other => {
                return Err(CodegenError::Unsupported(format!(
                    "array literal with {} element(s) of type '{}'",
                    elems.len(),
                    other
                )))
            }
        };
        if elems.is_empty() {
            return Ok(CodegenValue::new("zeroinitializer", array_ty));
        }

        let mut current = "undef".to_string();
        for (i, elem) in elems.iter().enumerate() {
            let value = self.generate_expr(elem)?;
            let value = self.coerce(value, &elem.ty, &elem_ty)?;
            current = self.insert(&array_ty, &current, &value.typed(), i);
        }
        Ok(CodegenValue::new(current, array_ty))
    }

    fn insert(&mut self, aggregate: &IrType, current: &str, element: &str, index: usize) -> String {
        let reg = self.reg();
        self.emit(format!(
            "{} = insertvalue {} {}, {}, {}",
            reg, aggregate, current, element, index
        ));
        reg
    }
}
