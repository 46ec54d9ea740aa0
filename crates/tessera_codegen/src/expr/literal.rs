//! Literal Code Generation

use tessera_syntax::{Literal, TypeRef};

use crate::error::CodegenResult;
use crate::function::FunctionGenerator;
use crate::ir::{float_literal, CodegenValue, IrType};

impl FunctionGenerator<'_> {
    pub(crate) fn gen_literal(&mut self, lit: &Literal, ty: &TypeRef) -> CodegenResult<CodegenValue> {
        match lit {
            Literal::Int(value) => {
                let ir = self.resolve(ty)?;
                if ir.is_float() {
                    return Ok(CodegenValue::new(float_literal(*value as f64, &ir), ir));
                }
                let ir = if ir.is_int() { ir } else { IrType::i32() };
                Ok(CodegenValue::new(value.to_string(), ir))
            }
            Literal::Float(value) => {
                let ir = self.resolve(ty)?;
                let ir = if ir.is_float() { ir } else { IrType::Double };
                Ok(CodegenValue::new(float_literal(*value, &ir), ir))
            }
            Literal::Bool(value) => Ok(CodegenValue::new(
                if *value { "true" } else { "false" },
                IrType::i1(),
            )),
            Literal::String(value) => {
                let pointer = self.ctx.string_pointer(value);
                Ok(CodegenValue::new(pointer, IrType::i8_ptr()))
            }
            Literal::Null => {
                let ir = self.resolve(ty)?;
                let ir = if ir.is_pointer() { ir } else { IrType::i8_ptr() };
                Ok(CodegenValue::new("null", ir))
            }
        }
    }
}
