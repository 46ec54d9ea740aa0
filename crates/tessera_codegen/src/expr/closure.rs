//! Lambda Lifting
//!
//! lambda 提升为独立函数 `<外层符号>_lambda_<n>`，捕获的变量按值复制进
//! 堆上的环境结构体；函数体入队，等外层函数发射完再生成。

use tessera_monomorph::{BodySource, LambdaBody, PendingGeneration};
use tessera_syntax::{Expr, Param, Stmt, TypeRef};
use tracing::debug;

use crate::error::{CodegenError, CodegenResult};
use crate::function::FunctionGenerator;
use crate::ir::{CodegenValue, IrType};
use crate::runtime::MALLOC;

impl FunctionGenerator<'_> {
    pub(crate) fn gen_lambda(
        &mut self,
        params: &[Param],
        body: &[Stmt],
        captures: &[Param],
        expr: &Expr,
    ) -> CodegenResult<CodegenValue> {
        let return_type = match self.concrete(&expr.ty) {
            TypeRef::Function { ret, .. } => *ret,
            other => {
                return Err(CodegenError::Unsupported(format!(
                    "lambda with non-function type '{}'",
                    other
                )))
            }
        };
        let id = self.ctx.next_lambda_id();
        let symbol = format!("{}_lambda_{}", self.symbol, id);
        let env_type = format!("{}_env", symbol);

        let ret = self.resolve(&return_type)?;
        let param_types = params
            .iter()
            .map(|p| self.resolve(&p.ty))
            .collect::<CodegenResult<Vec<_>>>()?;
        let capture_types = captures
            .iter()
            .map(|c| self.resolve(&c.ty))
            .collect::<CodegenResult<Vec<_>>>()?;

        let env = if captures.is_empty() {
            "null".to_string()
        } else {
            self.ctx.type_defs.push(format!(
                "%struct.{} = type {}",
                env_type,
                IrType::Anon(capture_types.clone())
            ));
            self.pack_env(&env_type, captures, &capture_types)?
        };
        debug!(%symbol, captures = captures.len(), "lift lambda");

        self.ctx.instances.request("lambda", &[], &symbol);
        self.ctx.pending.push(PendingGeneration {
            symbol: symbol.clone(),
            source: BodySource::Lambda(Box::new(LambdaBody {
                params: params.to_vec(),
                captures: captures.to_vec(),
                body: body.to_vec(),
                return_type,
                env_type,
                location: expr.location.clone(),
            })),
            substitution: self.subst.clone(),
        });

        let closure_ty = IrType::closure(ret.clone(), param_types.clone(), false);
        let code_ty = IrType::code_pointer(ret, param_types, false);
        let with_code = self.reg();
        self.emit(format!(
            "{} = insertvalue {} undef, {} @{}, 0",
            with_code, closure_ty, code_ty, symbol
        ));
        let reg = self.reg();
        self.emit(format!(
            "{} = insertvalue {} {}, i8* {}, 1",
            reg, closure_ty, with_code, env
        ));
        Ok(CodegenValue::new(reg, closure_ty))
    }

    /// malloc 环境结构体并写入捕获值，返回 i8* 指针
    fn pack_env(
        &mut self,
        env_type: &str,
        captures: &[Param],
        types: &[IrType],
    ) -> CodegenResult<String> {
        let env_ty = IrType::Struct(env_type.to_string());
        let (size, _) = self.ctx.aggregate_size_align(types)?;
        let raw = self.reg();
        self.emit(format!("{} = call i8* @{}(i64 {})", raw, MALLOC, size.max(1)));
        let typed = self.reg();
        self.emit(format!("{} = bitcast i8* {} to {}*", typed, raw, env_ty));

        for (i, (capture, ty)) in captures.iter().zip(types).enumerate() {
            let local = self
                .locals
                .get(&capture.name)
                .cloned()
                .ok_or_else(|| CodegenError::UndefinedVariable(capture.name.clone()))?;
            let value = self.load(&local.ir, &local.ptr);
            let value = self.coerce(CodegenValue::new(value, local.ir), &local.ty, ty)?;
            let field = self.reg();
            self.emit(format!(
                "{} = getelementptr inbounds {}, {}* {}, i32 0, i32 {}",
                field, env_ty, env_ty, typed, i
            ));
            self.store(&value, &field);
        }
        Ok(raw)
    }
}
