//! Statement Code Generation
//!
//! 语句降级。每条语句的错误在这里附上源码位置。

use rustc_hash::FxHashSet;
use tessera_syntax::{Expr, Stmt, SwitchCase, TypeRef};

use crate::error::{CodegenError, CodegenResult};
use crate::function::{FunctionGenerator, Local, LoopContext};
use crate::ir::{CodegenValue, IrType};

impl FunctionGenerator<'_> {
    /// 生成代码块；块内声明的局部变量在块结束后失效
    pub(crate) fn generate_block(&mut self, stmts: &[Stmt]) -> CodegenResult<()> {
        let saved = self.locals.clone();
        let result = stmts.iter().try_for_each(|stmt| self.generate_stmt(stmt));
        self.locals = saved;
        result
    }

    pub(crate) fn generate_stmt(&mut self, stmt: &Stmt) -> CodegenResult<()> {
        if let Some(location) = stmt.location() {
            self.set_location(location);
        }
        let result = match stmt {
            Stmt::Let { name, ty, value, .. } => self.gen_let(name, ty, value.as_ref()),
            Stmt::Expr(expr) => self.generate_expr(expr).map(|_| ()),
            Stmt::Return { value, .. } => self.gen_return(value.as_ref()),
            Stmt::If {
                condition,
                then_block,
                else_block,
                ..
            } => self.gen_if(condition, then_block, else_block.as_deref()),
            Stmt::While {
                condition, body, ..
            } => self.gen_while(condition, body),
            Stmt::Break { .. } => self.gen_loop_jump("break"),
            Stmt::Continue { .. } => self.gen_loop_jump("continue"),
            Stmt::Switch {
                scrutinee,
                cases,
                default,
                ..
            } => self.gen_switch(scrutinee, cases, default.as_deref()),
            Stmt::Block(stmts) => self.generate_block(stmts),
        };
        match stmt.location() {
            Some(location) => result.map_err(|e| e.at(location)),
            None => result,
        }
    }

    fn gen_let(&mut self, name: &str, ty: &TypeRef, value: Option<&Expr>) -> CodegenResult<()> {
        let ir = self.resolve(ty)?;
        let slot = self.alloca(&ir);
        let init = match value {
            Some(expr) => {
                let value = self.generate_expr(expr)?;
                self.coerce(value, &expr.ty, &ir)?
            }
            None => CodegenValue::new(ir.zero_value(), ir.clone()),
        };
        self.store(&init, &slot);
        self.locals.insert(
            name.to_string(),
            Local {
                ptr: slot,
                ty: ty.clone(),
                ir,
            },
        );
        Ok(())
    }

    fn gen_return(&mut self, value: Option<&Expr>) -> CodegenResult<()> {
        let ret = self.return_type.clone();
        match value {
            Some(expr) if !ret.is_void() => {
                let value = self.generate_expr(expr)?;
                let value = self.coerce(value, &expr.ty, &ret)?;
                self.terminate(format!("ret {}", value.typed()));
            }
            Some(expr) => {
                // void 函数里的 `return f();`
                self.generate_expr(expr)?;
                self.emit_default_return();
            }
            None => self.emit_default_return(),
        }
        Ok(())
    }

    fn gen_if(
        &mut self,
        condition: &Expr,
        then_block: &[Stmt],
        else_block: Option<&[Stmt]>,
    ) -> CodegenResult<()> {
        let cond = self.generate_condition(condition)?;
        let then_label = self.label("if.then");
        let end_label = self.label("if.end");
        let else_label = match else_block {
            Some(_) => self.label("if.else"),
            None => end_label.clone(),
        };
        self.terminate(format!(
            "br i1 {}, label %{}, label %{}",
            cond, then_label, else_label
        ));

        self.start_block(&then_label);
        self.generate_block(then_block)?;
        if !self.is_terminated() {
            self.terminate(format!("br label %{}", end_label));
        }

        if let Some(else_block) = else_block {
            self.start_block(&else_label);
            self.generate_block(else_block)?;
            if !self.is_terminated() {
                self.terminate(format!("br label %{}", end_label));
            }
        }

        self.start_block(&end_label);
        Ok(())
    }

    fn gen_while(&mut self, condition: &Expr, body: &[Stmt]) -> CodegenResult<()> {
        let cond_label = self.label("while.cond");
        let body_label = self.label("while.body");
        let end_label = self.label("while.end");

        self.start_block(&cond_label);
        let cond = self.generate_condition(condition)?;
        self.terminate(format!(
            "br i1 {}, label %{}, label %{}",
            cond, body_label, end_label
        ));

        self.start_block(&body_label);
        self.loop_stack.push(LoopContext {
            continue_label: cond_label.clone(),
            break_label: end_label.clone(),
        });
        let result = self.generate_block(body);
        self.loop_stack.pop();
        result?;
        if !self.is_terminated() {
            self.terminate(format!("br label %{}", cond_label));
        }

        self.start_block(&end_label);
        Ok(())
    }

    /// 分支体结束后跳到 switch.end。`break`/`continue` 仍作用于外层循环
    fn gen_switch(
        &mut self,
        scrutinee: &Expr,
        cases: &[SwitchCase],
        default: Option<&[Stmt]>,
    ) -> CodegenResult<()> {
        let value = self.generate_expr(scrutinee)?;
        if !value.ty.is_int() {
            return Err(CodegenError::Unsupported(format!(
                "switch on '{}'",
                value.ty
            )));
        }
        let end_label = self.label("switch.end");
        let default_label = match default {
            Some(_) => self.label("switch.default"),
            None => end_label.clone(),
        };

        let mut targets = Vec::new();
        let mut seen = FxHashSet::default();
        let mut case_labels = Vec::with_capacity(cases.len());
        for case in cases {
            let label = self.label("switch.case");
            // 重复的值只取第一个分支
            if seen.insert(case.value) {
                targets.push(format!("{} {}, label %{}", value.ty, case.value, label));
            }
            case_labels.push(label);
        }
        self.terminate(format!(
            "switch {}, label %{} [ {} ]",
            value.typed(),
            default_label,
            targets.join(" ")
        ));

        for (case, label) in cases.iter().zip(&case_labels) {
            self.start_block(label);
            self.generate_block(&case.body)?;
            if !self.is_terminated() {
                self.terminate(format!("br label %{}", end_label));
            }
        }
        if let Some(default) = default {
            self.start_block(&default_label);
            self.generate_block(default)?;
            if !self.is_terminated() {
                self.terminate(format!("br label %{}", end_label));
            }
        }

        self.start_block(&end_label);
        Ok(())
    }

    fn gen_loop_jump(&mut self, keyword: &'static str) -> CodegenResult<()> {
        let target = match self.loop_stack.last() {
            Some(ctx) if keyword == "break" => ctx.break_label.clone(),
            Some(ctx) => ctx.continue_label.clone(),
            None => return Err(CodegenError::LoopControlOutsideLoop(keyword)),
        };
        self.terminate(format!("br label %{}", target));
        Ok(())
    }

    /// 条件表达式求值为 i1
    pub(crate) fn generate_condition(&mut self, condition: &Expr) -> CodegenResult<String> {
        let value = self.generate_expr(condition)?;
        match &value.ty {
            IrType::Int(1) => Ok(value.value),
            IrType::Int(_) | IrType::Ptr(_) => {
                let reg = self.reg();
                let zero = value.ty.zero_value();
                self.emit(format!("{} = icmp ne {}, {}", reg, value.typed(), zero));
                Ok(reg)
            }
            other => Err(CodegenError::Unsupported(format!(
                "condition of type '{}'",
                other
            ))),
        }
    }
}
