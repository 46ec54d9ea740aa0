//! Function Call Code Generation
//!
//! 按名称调用的解析顺序：局部闭包 → 外部函数 → 源函数（泛型的先实例化）

use tessera_monomorph::Substitution;
use tessera_syntax::{Expr, TypeRef};

use crate::error::{CodegenError, CodegenResult};
use crate::function::FunctionGenerator;
use crate::ir::{CodegenValue, IrType};

impl FunctionGenerator<'_> {
    pub(crate) fn gen_call(
        &mut self,
        callee: &str,
        generic_args: &[TypeRef],
        args: &[Expr],
        result_ty: &TypeRef,
    ) -> CodegenResult<CodegenValue> {
        if let Some(local) = self.locals.get(callee).cloned() {
            let closure = CodegenValue::new(self.load(&local.ir, &local.ptr), local.ir);
            return self.call_closure_value(closure, args, result_ty);
        }

        if let Some(ext) = self.ctx.externs.get(callee).cloned() {
            let params = ext
                .params
                .iter()
                .map(|p| self.resolve(&p.ty))
                .collect::<CodegenResult<Vec<_>>>()?;
            let ret = self.resolve(&ext.return_type)?;
            let values = self.gen_args(args, &params)?;
            if !ext.variadic {
                return Ok(self.emit_call(&ret, &format!("@{}", ext.name), None, &values));
            }
            // 可变参数调用必须写出完整的函数类型
            let fn_ty = IrType::Func {
                ret: Box::new(ret.clone()),
                params,
                variadic: true,
            };
            let operands = values
                .iter()
                .map(CodegenValue::typed)
                .collect::<Vec<_>>()
                .join(", ");
            if ret.is_void() {
                self.emit(format!("call {} @{}({})", fn_ty, ext.name, operands));
                return Ok(CodegenValue::void());
            }
            let reg = self.reg();
            self.emit(format!("{} = call {} @{}({})", reg, fn_ty, ext.name, operands));
            return Ok(CodegenValue::new(reg, ret));
        }

        let (symbol, params, ret) = self.function_target(callee, generic_args)?;
        let values = self.gen_args(args, &params)?;
        let env = if symbol == "main" { None } else { Some("i8* null") };
        Ok(self.emit_call(&ret, &format!("@{}", symbol), env, &values))
    }

    /// 调用闭包值
    pub(crate) fn gen_closure_call(
        &mut self,
        callee: &Expr,
        args: &[Expr],
        result_ty: &TypeRef,
    ) -> CodegenResult<CodegenValue> {
        let closure = self.generate_expr(callee)?;
        self.call_closure_value(closure, args, result_ty)
    }

    fn call_closure_value(
        &mut self,
        closure: CodegenValue,
        args: &[Expr],
        result_ty: &TypeRef,
    ) -> CodegenResult<CodegenValue> {
        let (ret, params) = match &closure.ty {
            IrType::Anon(fields) if fields.len() == 2 => match &fields[0] {
                IrType::Ptr(inner) => match inner.as_ref() {
                    IrType::Func { ret, params, .. } => {
                        ((**ret).clone(), params[1..].to_vec())
                    }
                    _ => return Err(not_callable(&closure.ty)),
                },
                _ => return Err(not_callable(&closure.ty)),
            },
            _ => return Err(not_callable(&closure.ty)),
        };

        let code = self.reg();
        self.emit(format!("{} = extractvalue {}, 0", code, closure.typed()));
        let env = self.reg();
        self.emit(format!("{} = extractvalue {}, 1", env, closure.typed()));
        let values = self.gen_args(args, &params)?;
        let env_arg = format!("i8* {}", env);
        let value = self.emit_call(&ret, &code, Some(&env_arg), &values);
        let expected = self.resolve(result_ty)?;
        self.coerce(value, result_ty, &expected)
    }

    /// 把具名函数包装成环境为空的闭包值
    pub(crate) fn gen_function_ref(
        &mut self,
        name: &str,
        generic_args: &[TypeRef],
    ) -> CodegenResult<CodegenValue> {
        let (symbol, params, ret) = self.function_target(name, generic_args)?;
        let closure_ty = IrType::closure(ret.clone(), params.clone(), false);
        let code_ty = IrType::code_pointer(ret, params, false);

        let with_code = self.reg();
        self.emit(format!(
            "{} = insertvalue {} undef, {} @{}, 0",
            with_code, closure_ty, code_ty, symbol
        ));
        let reg = self.reg();
        self.emit(format!(
            "{} = insertvalue {} {}, i8* null, 1",
            reg, closure_ty, with_code
        ));
        Ok(CodegenValue::new(reg, closure_ty))
    }

    /// 源函数的符号名与签名；泛型函数先请求实例
    fn function_target(
        &mut self,
        name: &str,
        generic_args: &[TypeRef],
    ) -> CodegenResult<(String, Vec<IrType>, IrType)> {
        let decl = self
            .ctx
            .functions
            .get(name)
            .cloned()
            .ok_or_else(|| CodegenError::UndefinedFunction(name.to_string()))?;
        let (symbol, subst) = if decl.is_generic() {
            let symbol = self
                .ctx
                .instantiate_function(name, generic_args, &self.subst)?;
            let args = self.subst.apply_all(generic_args);
            (symbol, Substitution::from_params(&decl.generic_params, &args))
        } else {
            (self.ctx.function_symbol(&decl), Substitution::new())
        };
        let params = decl
            .params
            .iter()
            .map(|p| self.ctx.resolve_type(&p.ty, &subst))
            .collect::<CodegenResult<Vec<_>>>()?;
        let ret = self.ctx.resolve_type(&decl.return_type, &subst)?;
        Ok((symbol, params, ret))
    }

    /// 逐个求值实参并转换为形参类型；超出形参的（可变参数）原样传递
    pub(crate) fn gen_args(
        &mut self,
        args: &[Expr],
        params: &[IrType],
    ) -> CodegenResult<Vec<CodegenValue>> {
        let mut values = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let value = self.generate_expr(arg)?;
            let value = match params.get(i) {
                Some(param) => self.coerce(value, &arg.ty, param)?,
                // C 可变参数的默认提升
                None if value.ty == IrType::Float => {
                    self.convert(value, &IrType::Double, false, false)?
                }
                None => value,
            };
            values.push(value);
        }
        Ok(values)
    }

    /// 发射 call 指令；`env` 为隐式的第一个实参
    pub(crate) fn emit_call(
        &mut self,
        ret: &IrType,
        callee: &str,
        env: Option<&str>,
        args: &[CodegenValue],
    ) -> CodegenValue {
        let mut operands: Vec<String> = Vec::with_capacity(args.len() + 1);
        if let Some(env) = env {
            operands.push(env.to_string());
        }
        operands.extend(args.iter().map(CodegenValue::typed));
        let operands = operands.join(", ");
        if ret.is_void() {
            self.emit(format!("call void {}({})", callee, operands));
            CodegenValue::void()
        } else {
            let reg = self.reg();
            self.emit(format!("{} = call {} {}({})", reg, ret, callee, operands));
            CodegenValue::new(reg, ret.clone())
        }
    }
}

fn not_callable(ty: &IrType) -> CodegenError {
    CodegenError::Unsupported(format!("value of type '{}' is not callable", ty))
}
