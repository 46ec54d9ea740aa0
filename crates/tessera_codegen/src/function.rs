//! Function Code Generation
//!
//! 函数代码生成器：一次只发射一个函数体。寄存器 `%tN` 与标签 `name.N`
//! 都只在函数内部计数，所有 alloca 提升到入口块。

use rustc_hash::FxHashMap;
use tessera_monomorph::Substitution;
use tessera_syntax::{Param, SourceLocation, Stmt, TypeRef};

use crate::context::CodegenContext;
use crate::error::CodegenResult;
use crate::ir::{CodegenValue, IrType};

/// 闭包环境参数名
pub const ENV_PARAM: &str = "%__env";

/// 局部变量：栈槽地址与类型
#[derive(Debug, Clone)]
pub(crate) struct Local {
    pub ptr: String,
    pub ty: TypeRef,
    pub ir: IrType,
}

/// 循环上下文（break/continue 目标）
#[derive(Debug, Clone)]
pub(crate) struct LoopContext {
    pub continue_label: String,
    pub break_label: String,
}

/// 被提升 lambda 的捕获环境
#[derive(Debug, Clone)]
pub struct LambdaEnv {
    /// 环境结构体名（不含 `%struct.` 前缀）
    pub struct_name: String,
    pub captures: Vec<Param>,
}

/// 待发射函数的签名
#[derive(Debug, Clone)]
pub struct FunctionSignature {
    pub symbol: String,
    pub params: Vec<Param>,
    pub return_type: TypeRef,
    /// 实例方法的所属类型（具体名称）
    pub this: Option<String>,
    pub env: Option<LambdaEnv>,
    pub location: SourceLocation,
}

/// 函数代码生成器
pub struct FunctionGenerator<'c> {
    pub(crate) ctx: &'c mut CodegenContext,
    pub(crate) subst: Substitution,
    pub(crate) symbol: String,
    allocas: Vec<String>,
    body: Vec<String>,
    next_reg: usize,
    next_label: usize,
    pub(crate) current_block: String,
    pub(crate) locals: FxHashMap<String, Local>,
    pub(crate) loop_stack: Vec<LoopContext>,
    pub(crate) return_type: IrType,
    pub(crate) return_ref: TypeRef,
    pub(crate) is_main: bool,
    terminated: bool,
    pub(crate) scope: Option<u32>,
    pub(crate) dbg: Option<u32>,
}

impl<'c> FunctionGenerator<'c> {
    pub fn new(ctx: &'c mut CodegenContext, symbol: &str, subst: Substitution) -> Self {
        Self {
            ctx,
            subst,
            symbol: symbol.to_string(),
            allocas: Vec::new(),
            body: Vec::new(),
            next_reg: 0,
            next_label: 0,
            current_block: "entry".to_string(),
            locals: FxHashMap::default(),
            loop_stack: Vec::new(),
            return_type: IrType::Void,
            return_ref: TypeRef::void(),
            is_main: symbol == "main",
            terminated: false,
            scope: None,
            dbg: None,
        }
    }

    /// 生成完整的函数定义并追加到模块
    pub fn generate(mut self, sig: &FunctionSignature, body: &[Stmt]) -> CodegenResult<()> {
        self.return_ref = sig.return_type.clone();
        self.return_type = if self.is_main {
            IrType::i32()
        } else {
            self.resolve(&sig.return_type)?
        };

        let mut params = Vec::new();
        if !self.is_main {
            params.push(format!("i8* {}", ENV_PARAM));
        }
        let mut prologue = Vec::new();
        if let Some(owner) = &sig.this {
            let ty = self.ctx.owner_ir_type(owner).ptr_to();
            params.push(format!("{} %this", ty));
            let this_ref = TypeRef::pointer(TypeRef::named(owner.as_str()), 1);
            prologue.push(("this".to_string(), "%this".to_string(), this_ref, ty));
        }
        for param in &sig.params {
            let ir = self.resolve(&param.ty)?;
            let incoming = format!("%{}.arg", param.name);
            params.push(format!("{} {}", ir, incoming));
            prologue.push((param.name.clone(), incoming, param.ty.clone(), ir));
        }

        self.scope = self
            .ctx
            .debug_subprogram(&sig.symbol, &self.return_type.clone(), &sig.location);

        for (name, incoming, ty, ir) in prologue {
            let slot = self.alloca(&ir);
            self.emit(format!("store {} {}, {}* {}", ir, incoming, ir, slot));
            self.locals.insert(name, Local { ptr: slot, ty, ir });
        }
        if let Some(env) = &sig.env {
            self.unpack_env(env)?;
        }

        self.generate_block(body)?;
        if !self.terminated {
            self.emit_default_return();
        }

        let dbg_suffix = self
            .scope
            .map(|id| format!(" !dbg !{}", id))
            .unwrap_or_default();
        let mut out = format!(
            "define {} @{}({}){} {{\nentry:\n",
            self.return_type,
            sig.symbol,
            params.join(", "),
            dbg_suffix
        );
        for line in self.allocas.iter().chain(&self.body) {
            out.push_str(line);
            out.push('\n');
        }
        out.push_str("}\n");

        self.ctx.function_defs.push(out);
        self.ctx.emitted_functions.insert(sig.symbol.clone());
        Ok(())
    }

    /// 从环境指针取出捕获变量，复制到本地栈槽
    fn unpack_env(&mut self, env: &LambdaEnv) -> CodegenResult<()> {
        if env.captures.is_empty() {
            return Ok(());
        }
        let env_ty = IrType::Struct(env.struct_name.clone());
        let env_ptr = self.reg();
        self.emit(format!(
            "{} = bitcast i8* {} to {}*",
            env_ptr, ENV_PARAM, env_ty
        ));
        for (i, capture) in env.captures.iter().enumerate() {
            let ir = self.resolve(&capture.ty)?;
            let field = self.reg();
            self.emit(format!(
                "{} = getelementptr inbounds {}, {}* {}, i32 0, i32 {}",
                field, env_ty, env_ty, env_ptr, i
            ));
            let value = self.load(&ir, &field);
            let slot = self.alloca(&ir);
            self.emit(format!("store {} {}, {}* {}", ir, value, ir, slot));
            self.locals.insert(
                capture.name.clone(),
                Local {
                    ptr: slot,
                    ty: capture.ty.clone(),
                    ir,
                },
            );
        }
        Ok(())
    }

    /// 函数末尾没有 return 时的隐式返回
    pub(crate) fn emit_default_return(&mut self) {
        let line = if self.is_main {
            "ret i32 0".to_string()
        } else if self.return_type.is_void() {
            "ret void".to_string()
        } else {
            format!("ret {} {}", self.return_type, self.return_type.zero_value())
        };
        self.terminate(line);
    }

    // ---- 指令缓冲 ----

    /// 新的虚拟寄存器
    pub(crate) fn reg(&mut self) -> String {
        let reg = format!("%t{}", self.next_reg);
        self.next_reg += 1;
        reg
    }

    /// 新的块标签
    pub(crate) fn label(&mut self, name: &str) -> String {
        let label = format!("{}.{}", name, self.next_label);
        self.next_label += 1;
        label
    }

    /// 追加一条指令；前一条是终结指令时先开一个不可达块
    pub(crate) fn emit(&mut self, line: impl Into<String>) {
        if self.terminated {
            let dead = self.label("dead");
            self.body.push(format!("{}:", dead));
            self.current_block = dead;
            self.terminated = false;
        }
        let mut line = line.into();
        if let Some(dbg) = self.dbg {
            line.push_str(&format!(", !dbg !{}", dbg));
        }
        self.body.push(format!("  {}", line));
    }

    /// 追加终结指令
    pub(crate) fn terminate(&mut self, line: impl Into<String>) {
        self.emit(line);
        self.terminated = true;
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// 开始新块；当前块未终结时先跳转过去
    pub(crate) fn start_block(&mut self, label: &str) {
        if !self.terminated {
            self.body.push(format!("  br label %{}", label));
        }
        self.body.push(format!("{}:", label));
        self.current_block = label.to_string();
        self.terminated = false;
    }

    /// 入口块中的栈槽
    pub(crate) fn alloca(&mut self, ty: &IrType) -> String {
        let reg = self.reg();
        self.allocas.push(format!("  {} = alloca {}", reg, ty));
        reg
    }

    pub(crate) fn load(&mut self, ty: &IrType, ptr: &str) -> String {
        let reg = self.reg();
        self.emit(format!("{} = load {}, {}* {}", reg, ty, ty, ptr));
        reg
    }

    pub(crate) fn store(&mut self, value: &CodegenValue, ptr: &str) {
        self.emit(format!(
            "store {}, {}* {}",
            value.typed(),
            value.ty,
            ptr
        ));
    }

    /// 按当前替换表解析类型
    pub(crate) fn resolve(&mut self, ty: &TypeRef) -> CodegenResult<IrType> {
        self.ctx.resolve_type(ty, &self.subst)
    }

    /// 当前替换表下的具体源类型
    pub(crate) fn concrete(&self, ty: &TypeRef) -> TypeRef {
        self.subst.apply(ty)
    }

    /// 语句开始时更新调试位置
    pub(crate) fn set_location(&mut self, location: &SourceLocation) {
        self.dbg = match self.scope {
            Some(scope) => self.ctx.debug_location(location, scope),
            None => None,
        };
    }
}
