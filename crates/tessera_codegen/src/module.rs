//! Module Code Generation
//!
//! 模块代码生成器：按声明顺序发射，每个顶层声明之后排空延迟生成队列。

use tessera_monomorph::{BodySource, Claim, PendingGeneration, Substitution};
use tessera_syntax::{Decl, ExternDecl, FunctionDecl, Module};
use tracing::debug;

use crate::context::CodegenContext;
use crate::error::{CodegenError, CodegenResult};
use crate::function::{FunctionGenerator, FunctionSignature, LambdaEnv};
use crate::ir::IrType;
use crate::runtime;

/// 模块代码生成器
pub struct ModuleGenerator<'a> {
    ctx: &'a mut CodegenContext,
}

impl<'a> ModuleGenerator<'a> {
    pub fn new(ctx: &'a mut CodegenContext) -> Self {
        Self { ctx }
    }

    /// 生成整个模块
    pub fn generate(&mut self, module: &Module) -> CodegenResult<()> {
        self.ctx.register_module(module);
        runtime::inject_runtime(self.ctx);

        // 外部函数先声明，函数体里可以随时调用
        for decl in &module.decls {
            if let Decl::Extern(ext) = decl {
                self.declare_extern(ext)
                    .map_err(|e| e.at(&ext.location))?;
            }
        }

        for decl in &module.decls {
            self.generate_decl(decl).map_err(|e| match decl_location(decl) {
                Some(location) => e.at(location),
                None => e,
            })?;
            self.drain_pending()?;
        }
        self.drain_pending()
    }

    fn generate_decl(&mut self, decl: &Decl) -> CodegenResult<()> {
        match decl {
            Decl::Struct(s) if s.is_template() => Ok(()),
            Decl::Struct(s) => {
                self.ctx.define_struct(&s.name)?;
                self.ctx
                    .owner_substitutions
                    .insert(s.name.clone(), Substitution::new());
                self.ctx.queue_methods(&s.name, &s.methods, &Substitution::new());
                Ok(())
            }
            Decl::Enum(e) if e.is_template() => Ok(()),
            Decl::Enum(e) => {
                self.ctx.define_enum(&e.name)?;
                self.ctx
                    .owner_substitutions
                    .insert(e.name.clone(), Substitution::new());
                self.ctx.queue_methods(&e.name, &e.methods, &Substitution::new());
                Ok(())
            }
            // 泛型函数在首次调用时才实例化
            Decl::Function(f) if f.is_generic() => Ok(()),
            Decl::Function(f) => {
                let symbol = self.ctx.function_symbol(f);
                self.emit_function(f, &symbol, None, Substitution::new())
            }
            Decl::Extern(_) | Decl::TypeAlias(_) => Ok(()),
        }
    }

    fn declare_extern(&mut self, ext: &ExternDecl) -> CodegenResult<()> {
        let none = Substitution::new();
        let ret = self.ctx.resolve_type(&ext.return_type, &none)?;
        let params = ext
            .params
            .iter()
            .map(|p| self.ctx.resolve_type(&p.ty, &none))
            .collect::<CodegenResult<Vec<_>>>()?;
        let fn_ty = IrType::Func {
            ret: Box::new(ret.clone()),
            params,
            variadic: ext.variadic,
        };
        // "i32 (i8*, ...)" -> "declare i32 @printf(i8*, ...)"
        let signature = fn_ty.to_string();
        let args = signature
            .strip_prefix(&format!("{} ", ret))
            .unwrap_or(&signature);
        self.ctx
            .declare_function(&ext.name, format!("declare {} @{}{}", ret, ext.name, args));
        Ok(())
    }

    /// 按 FIFO 顺序排空延迟生成队列
    pub fn drain_pending(&mut self) -> CodegenResult<()> {
        if let Some(active) = self.ctx.current_function() {
            return Err(CodegenError::Unsupported(format!(
                "pending generations drained while '{}' is being emitted",
                active
            )));
        }
        while let Some(item) = self.ctx.pending.pop() {
            debug!(symbol = %item.symbol, remaining = self.ctx.pending.len(), "drain");
            self.generate_pending(item)?;
        }
        Ok(())
    }

    fn generate_pending(&mut self, item: PendingGeneration) -> CodegenResult<()> {
        if self.ctx.emitted_functions.contains(&item.symbol) {
            return Ok(());
        }
        if let Claim::Existing(_) = self.ctx.instances.begin("", &[], &item.symbol) {
            return Ok(());
        }
        let result = match &item.source {
            BodySource::Function { template } => {
                let decl = self
                    .ctx
                    .functions
                    .get(template)
                    .cloned()
                    .ok_or_else(|| CodegenError::UndefinedFunction(template.clone()))?;
                self.emit_function(&decl, &item.symbol, None, item.substitution.clone())
                    .map_err(|e| e.at(&decl.location))
            }
            BodySource::Method { owner, method } => {
                let decl = self.method_decl(owner, method)?;
                let this = if decl.is_static {
                    None
                } else {
                    Some(owner.clone())
                };
                self.emit_function(&decl, &item.symbol, this, item.substitution.clone())
                    .map_err(|e| e.at(&decl.location))
            }
            BodySource::Lambda(lambda) => {
                let sig = FunctionSignature {
                    symbol: item.symbol.clone(),
                    params: lambda.params.clone(),
                    return_type: lambda.return_type.clone(),
                    this: None,
                    env: Some(LambdaEnv {
                        struct_name: lambda.env_type.clone(),
                        captures: lambda.captures.clone(),
                    }),
                    location: lambda.location.clone(),
                };
                self.emit(&sig, &lambda.body, item.substitution.clone())
                    .map_err(|e| e.at(&lambda.location))
            }
        };
        result?;
        self.ctx.instances.complete(&item.symbol);
        Ok(())
    }

    fn method_decl(&self, owner: &str, method: &str) -> CodegenResult<FunctionDecl> {
        let methods = match (self.ctx.structs.get(owner), self.ctx.enums.get(owner)) {
            (Some(s), _) => &s.methods,
            (None, Some(e)) => &e.methods,
            (None, None) => {
                return Err(CodegenError::UnresolvedType {
                    name: owner.to_string(),
                    context: "method owner".to_string(),
                })
            }
        };
        methods
            .iter()
            .find(|m| m.name == method)
            .cloned()
            .ok_or_else(|| CodegenError::MissingMethod {
                owner: owner.to_string(),
                method: method.to_string(),
            })
    }

    fn emit_function(
        &mut self,
        decl: &FunctionDecl,
        symbol: &str,
        this: Option<String>,
        subst: Substitution,
    ) -> CodegenResult<()> {
        let sig = FunctionSignature {
            symbol: symbol.to_string(),
            params: decl.params.clone(),
            return_type: decl.return_type.clone(),
            this,
            env: None,
            location: decl.location.clone(),
        };
        self.emit(&sig, &decl.body, subst)
    }

    /// 发射一个函数体；期间触发的实例化只入队
    fn emit(
        &mut self,
        sig: &FunctionSignature,
        body: &[tessera_syntax::Stmt],
        subst: Substitution,
    ) -> CodegenResult<()> {
        debug!(symbol = %sig.symbol, "emit function");
        self.ctx.begin_function(&sig.symbol)?;
        let result = FunctionGenerator::new(self.ctx, &sig.symbol, subst).generate(sig, body);
        self.ctx.end_function();
        result
    }
}

fn decl_location(decl: &Decl) -> Option<&tessera_syntax::SourceLocation> {
    match decl {
        Decl::Struct(d) => Some(&d.location),
        Decl::Enum(d) => Some(&d.location),
        Decl::Function(d) => Some(&d.location),
        Decl::Extern(d) => Some(&d.location),
        Decl::TypeAlias(d) => Some(&d.location),
    }
}
