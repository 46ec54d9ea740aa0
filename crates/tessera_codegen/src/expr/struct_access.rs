//! Member, Index and Tuple Access
//!
//! 成员访问一律降级为按槽位下标的地址计算

use tessera_syntax::Expr;

use crate::error::{CodegenError, CodegenResult};
use crate::expr::Place;
use crate::function::FunctionGenerator;
use crate::ir::IrType;

impl FunctionGenerator<'_> {
    /// object.field 的地址
    pub(crate) fn member_place(&mut self, object: &Expr, field: &str) -> CodegenResult<Place> {
        let base = self.aggregate_base(object)?;
        let name = match &base.ty {
            IrType::Struct(name) => name.clone(),
            other => {
                return Err(CodegenError::InvalidLValue(format!(
                    "field access '.{}' on '{}'",
                    field, other
                )))
            }
        };
        let layout = self.ctx.struct_layout(&name)?;
        let slot = layout.slot(field).ok_or_else(|| CodegenError::UnknownField {
            owner: name.clone(),
            field: field.to_string(),
        })?;
        let ty = layout
            .field_type(slot)
            .cloned()
            .ok_or_else(|| CodegenError::UnknownField {
                owner: name,
                field: field.to_string(),
            })?;

        let reg = self.reg();
        self.emit(format!(
            "{} = getelementptr inbounds {}, {}* {}, i32 0, i32 {}",
            reg, base.ty, base.ty, base.ptr, slot
        ));
        Ok(Place { ptr: reg, ty })
    }

    /// object[index] 的地址；数组按值或按指针，裸指针按元素偏移
    pub(crate) fn index_place(&mut self, object: &Expr, index: &Expr) -> CodegenResult<Place> {
        let object_ty = self.resolve(&object.ty)?;
        let (base, elem, leading_zero) = match object_ty {
            IrType::Ptr(inner) if !matches!(*inner, IrType::Array(..)) => {
                let pointer = self.generate_expr(object)?;
                let base = Place {
                    ptr: pointer.value,
                    ty: (*inner).clone(),
                };
                (base, *inner, false)
            }
            _ => {
                let base = self.aggregate_base(object)?;
                let elem = match &base.ty {
                    IrType::Array(_, elem) => (**elem).clone(),
                    other => {
                        return Err(CodegenError::InvalidLValue(format!(
                            "index into '{}'",
                            other
                        )))
                    }
                };
                (base, elem, true)
            }
        };

        let idx = self.generate_expr(index)?;
        let idx = self.coerce(idx, &index.ty, &IrType::i64())?;
        let offset = if leading_zero {
            format!("i64 0, i64 {}", idx.value)
        } else {
            format!("i64 {}", idx.value)
        };
        let reg = self.reg();
        self.emit(format!(
            "{} = getelementptr inbounds {}, {}* {}, {}",
            reg, base.ty, base.ty, base.ptr, offset
        ));
        Ok(Place { ptr: reg, ty: elem })
    }

    /// tuple.N 的地址
    pub(crate) fn tuple_place(&mut self, object: &Expr, index: usize) -> CodegenResult<Place> {
        let base = self.aggregate_base(object)?;
        let ty = match &base.ty {
            IrType::Anon(fields) => fields.get(index).cloned().ok_or_else(|| {
                CodegenError::UnknownField {
                    owner: base.ty.to_string(),
                    field: index.to_string(),
                }
            })?,
            other => {
                return Err(CodegenError::InvalidLValue(format!(
                    "tuple index .{} on '{}'",
                    index, other
                )))
            }
        };
        let reg = self.reg();
        self.emit(format!(
            "{} = getelementptr inbounds {}, {}* {}, i32 0, i32 {}",
            reg, base.ty, base.ty, base.ptr, index
        ));
        Ok(Place { ptr: reg, ty })
    }
}
