//! Compilation Session
//!
//! 一次编译的全部状态：声明表、布局/虚表缓存、单态化记录、延迟生成队列，
//! 以及按段收集的输出文本。不存在跨编译的全局状态。

use indexmap::{IndexMap, IndexSet};
use rustc_hash::{FxHashMap, FxHashSet};
use tessera_monomorph::{GenerationQueue, InstanceTable, Mangler, Substitution};
use tessera_syntax::{
    Decl, EnumDecl, ExternDecl, FunctionDecl, Module, StructDecl, TypeAliasDecl,
};

use crate::debug::DebugInfoSink;
use crate::error::{CodegenError, CodegenResult};
use crate::ir::escape_string;
use crate::layout::{EnumLayout, StructLayout};

/// 代码生成选项
#[derive(Debug, Clone)]
pub struct CodegenOptions {
    pub module_name: String,
    pub target_triple: Option<String>,
    /// 是否调用调试信息接口
    pub debug_info: bool,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            module_name: "main".to_string(),
            target_triple: None,
            debug_info: false,
        }
    }
}

impl CodegenOptions {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            ..Self::default()
        }
    }
}

/// 代码生成上下文
///
/// 持有一次编译的所有表和缓存，在各个生成器之间以 `&mut` 传递
pub struct CodegenContext {
    pub options: CodegenOptions,

    // --- 声明表（模板与具体声明共用，单态化结果以修饰名登记） ---
    pub(crate) structs: FxHashMap<String, StructDecl>,
    pub(crate) enums: FxHashMap<String, EnumDecl>,
    pub(crate) functions: FxHashMap<String, FunctionDecl>,
    pub(crate) externs: FxHashMap<String, ExternDecl>,
    pub(crate) aliases: FxHashMap<String, TypeAliasDecl>,

    // --- 缓存 ---
    pub(crate) struct_layouts: FxHashMap<String, StructLayout>,
    pub(crate) enum_layouts: FxHashMap<String, EnumLayout>,
    pub(crate) vtable_layouts: FxHashMap<String, Vec<String>>,
    /// 具体类型名 -> 生成它的替换表
    pub(crate) owner_substitutions: FxHashMap<String, Substitution>,
    /// 正在计算布局的类型，用于发现按值的递归
    pub(crate) defining: FxHashSet<String>,
    pub(crate) instances: InstanceTable,
    pub(crate) pending: GenerationQueue,
    pub(crate) resolve_depth: usize,
    /// 正在发射函数体的符号
    pub(crate) current_function: Option<String>,
    pub(crate) emitted_functions: FxHashSet<String>,
    pub(crate) lambda_counter: usize,

    // --- 输出段 ---
    pub(crate) opaque_types: IndexSet<String>,
    pub(crate) type_defs: Vec<String>,
    pub(crate) constants: Vec<String>,
    /// 字符串内容 -> (全局名, 含结尾 0 的长度)
    pub(crate) strings: IndexMap<String, (String, usize)>,
    /// 函数名 -> declare 行
    pub(crate) declarations: IndexMap<String, String>,
    pub(crate) function_defs: Vec<String>,

    pub(crate) debug: Option<Box<dyn DebugInfoSink>>,
    pub(crate) debug_types: FxHashMap<String, u32>,
}

impl CodegenContext {
    pub fn new(options: CodegenOptions) -> Self {
        Self {
            options,
            structs: FxHashMap::default(),
            enums: FxHashMap::default(),
            functions: FxHashMap::default(),
            externs: FxHashMap::default(),
            aliases: FxHashMap::default(),
            struct_layouts: FxHashMap::default(),
            enum_layouts: FxHashMap::default(),
            vtable_layouts: FxHashMap::default(),
            owner_substitutions: FxHashMap::default(),
            defining: FxHashSet::default(),
            instances: InstanceTable::new(),
            pending: GenerationQueue::new(),
            resolve_depth: 0,
            current_function: None,
            emitted_functions: FxHashSet::default(),
            lambda_counter: 0,
            opaque_types: IndexSet::new(),
            type_defs: Vec::new(),
            constants: Vec::new(),
            strings: IndexMap::new(),
            declarations: IndexMap::new(),
            function_defs: Vec::new(),
            debug: None,
            debug_types: FxHashMap::default(),
        }
    }

    /// 安装调试信息收集器；只有 `debug_info` 打开时才会被调用
    pub fn with_debug_sink(mut self, sink: Box<dyn DebugInfoSink>) -> Self {
        self.debug = Some(sink);
        self
    }

    /// 登记模块中的全部声明
    pub fn register_module(&mut self, module: &Module) {
        for decl in &module.decls {
            self.register_decl(decl);
        }
    }

    pub fn register_decl(&mut self, decl: &Decl) {
        match decl {
            Decl::Struct(s) => {
                self.structs.insert(s.name.clone(), s.clone());
            }
            Decl::Enum(e) => {
                self.enums.insert(e.name.clone(), e.clone());
            }
            Decl::Function(f) => {
                self.functions.insert(f.name.clone(), f.clone());
            }
            Decl::Extern(e) => {
                self.externs.insert(e.name.clone(), e.clone());
            }
            Decl::TypeAlias(a) => {
                self.aliases.insert(a.name.clone(), a.clone());
            }
        }
    }

    /// 带别名表的名称修饰器
    pub fn mangler(&self) -> Mangler<'_, FxHashMap<String, TypeAliasDecl>> {
        Mangler::new(&self.aliases)
    }

    /// 单态化记录
    pub fn instances(&self) -> &InstanceTable {
        &self.instances
    }

    /// 尚未排空的延迟生成队列
    pub fn pending(&self) -> &GenerationQueue {
        &self.pending
    }

    pub fn struct_decl(&self, name: &str) -> Option<&StructDecl> {
        self.structs.get(name)
    }

    pub fn enum_decl(&self, name: &str) -> Option<&EnumDecl> {
        self.enums.get(name)
    }

    /// 已发射的类型定义行
    pub fn type_definitions(&self) -> &[String] {
        &self.type_defs
    }

    pub fn current_function(&self) -> Option<&str> {
        self.current_function.as_deref()
    }

    pub(crate) fn debug_enabled(&self) -> bool {
        self.options.debug_info && self.debug.is_some()
    }

    /// 开始发射一个函数体；函数体之间不允许嵌套
    pub(crate) fn begin_function(&mut self, symbol: &str) -> CodegenResult<()> {
        if let Some(active) = &self.current_function {
            return Err(CodegenError::Unsupported(format!(
                "cannot begin '{}' while '{}' is still being emitted",
                symbol, active
            )));
        }
        self.current_function = Some(symbol.to_string());
        Ok(())
    }

    pub(crate) fn end_function(&mut self) {
        self.current_function = None;
    }

    /// 前向声明的不透明类型
    pub(crate) fn declare_opaque(&mut self, name: &str) {
        self.opaque_types.insert(name.to_string());
    }

    /// 登记 `declare` 行；同名只保留第一次
    pub(crate) fn declare_function(&mut self, name: &str, line: String) {
        self.declarations.entry(name.to_string()).or_insert(line);
    }

    /// 字符串常量池；返回 (全局名, 数组长度)
    pub(crate) fn intern_string(&mut self, value: &str) -> (String, usize) {
        if let Some(entry) = self.strings.get(value) {
            return entry.clone();
        }
        let name = format!("@.str.{}", self.strings.len());
        let len = value.len() + 1;
        self.strings
            .insert(value.to_string(), (name.clone(), len));
        (name, len)
    }

    /// 指向字符串常量首字节的 i8* 常量表达式
    pub(crate) fn string_pointer(&mut self, value: &str) -> String {
        let (name, len) = self.intern_string(value);
        format!(
            "getelementptr inbounds ([{len} x i8], [{len} x i8]* {name}, i64 0, i64 0)",
            len = len,
            name = name
        )
    }

    pub(crate) fn next_lambda_id(&mut self) -> usize {
        let id = self.lambda_counter;
        self.lambda_counter += 1;
        id
    }

    /// 组装完整的 IR 文本
    pub fn finish(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("; ModuleID = '{}'\n", self.options.module_name));
        out.push_str(&format!(
            "source_filename = \"{}\"\n",
            self.options.module_name
        ));
        if let Some(triple) = &self.options.target_triple {
            out.push_str(&format!("target triple = \"{}\"\n", triple));
        }

        let defined: FxHashSet<&str> = self
            .struct_layouts
            .keys()
            .map(String::as_str)
            .collect();
        let opaque: Vec<String> = self
            .opaque_types
            .iter()
            .filter(|name| !defined.contains(name.as_str()))
            .map(|name| format!("%struct.{} = type opaque", name))
            .collect();
        push_section(&mut out, &opaque);
        push_section(&mut out, &self.type_defs);

        let strings: Vec<String> = self
            .strings
            .iter()
            .map(|(value, (name, len))| {
                format!(
                    "{} = private unnamed_addr constant [{} x i8] c\"{}\\00\", align 1",
                    name,
                    len,
                    escape_string(value)
                )
            })
            .collect();
        push_section(&mut out, &strings);
        push_section(&mut out, &self.constants);

        let declares: Vec<String> = self.declarations.values().cloned().collect();
        push_section(&mut out, &declares);

        for def in &self.function_defs {
            out.push('\n');
            out.push_str(def);
        }

        if let Some(debug) = &self.debug {
            if self.options.debug_info {
                push_section(&mut out, &debug.metadata_lines());
            }
        }
        out
    }
}

fn push_section(out: &mut String, lines: &[String]) {
    if lines.is_empty() {
        return;
    }
    out.push('\n');
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
}
