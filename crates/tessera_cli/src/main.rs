use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use tessera_driver::{build_executable, compile_file, CompilationOutput, CompileError, CompileOptions};
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "tessera")]
#[command(about = "Tessera 后端 - 把类型检查后的模块降级为 LLVM IR", version)]
struct Cli {
    /// 日志详细程度 (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 编译模块 JSON 为 LLVM IR
    Compile {
        /// 输入文件
        input: PathBuf,

        /// 输出文件 (默认: a.ll)
        #[arg(short, long, default_value = "a.ll")]
        output: PathBuf,

        /// 调用调试元数据接口
        #[arg(long)]
        debug_info: bool,

        /// 目标三元组
        #[arg(long)]
        target: Option<String>,
    },

    /// 只检查能否生成代码
    Check {
        /// 输入文件
        input: PathBuf,
    },

    /// 编译并生成可执行文件
    Build {
        /// 输入文件
        input: PathBuf,

        /// 输出文件 (默认: a.out)
        #[arg(short, long, default_value = "a.out")]
        output: PathBuf,

        /// 下游编译器 (默认: $TESSERA_CC 或 clang)
        #[arg(long)]
        cc: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Compile {
            input,
            output,
            debug_info,
            target,
        } => {
            let options = CompileOptions {
                target_triple: target,
                debug_info,
                ..CompileOptions::default()
            };
            cmd_compile(&input, &output, &options)?
        }
        Commands::Check { input } => cmd_check(&input)?,
        Commands::Build { input, output, cc } => {
            let mut options = CompileOptions::default();
            if let Some(cc) = cc {
                options.cc = cc;
            }
            cmd_build(&input, &output, &options)?
        }
    }

    Ok(())
}

/// RUST_LOG 优先；否则按 -v 的次数决定默认级别
fn init_tracing(verbose: u8) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .with(filter)
        .init();
}

fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    }
}

/// 编译；失败时输出诊断并以状态 1 退出
fn compile_or_exit(input: &Path, options: &CompileOptions) -> CompilationOutput {
    match compile_file(input, options) {
        Ok(output) => {
            info!(
                input = %input.display(),
                instances = output.instantiations.len(),
                warnings = output.warnings.len(),
                "compiled"
            );
            for warning in &output.warnings {
                eprintln!("{} {}", "warning:".yellow().bold(), warning);
            }
            output
        }
        Err(e) => {
            report(&e, input);
            std::process::exit(1);
        }
    }
}

fn report(error: &CompileError, input: &Path) {
    info!(input = %input.display(), "compilation failed");
    error.emit(Some(&input.display().to_string()));
}

/// 编译命令
fn cmd_compile(input: &Path, output: &Path, options: &CompileOptions) -> Result<()> {
    println!("📦 编译 {} ...", input.display());
    debug!(
        output = %output.display(),
        target = ?options.target_triple,
        debug_info = options.debug_info,
        "compile"
    );

    let result = compile_or_exit(input, options);
    fs::write(output, result.ir)
        .with_context(|| format!("failed to write {}", output.display()))?;
    info!(output = %output.display(), "IR written");
    println!(
        "{} 成功生成 {} ({} 个单态化实例)",
        "✅".green(),
        output.display(),
        result.instantiations.len()
    );

    Ok(())
}

/// 检查命令
fn cmd_check(input: &Path) -> Result<()> {
    println!("🔍 检查 {} ...", input.display());

    match compile_file(input, &CompileOptions::default()) {
        Ok(_) => {
            println!("{} 无错误", "✅".green());
            Ok(())
        }
        Err(e) => {
            eprintln!("{} 发现错误:", "❌".red());
            report(&e, input);
            std::process::exit(1);
        }
    }
}

/// 构建命令 - 生成可执行文件
fn cmd_build(input: &Path, output: &Path, options: &CompileOptions) -> Result<()> {
    println!("🔨 构建 {} ...", input.display());

    let result = compile_or_exit(input, options);

    println!("  ⚙️  调用 {} ...", options.cc);
    info!(cc = %options.cc, output = %output.display(), "invoking downstream compiler");
    if let Err(e) = build_executable(&result.ir, output, options) {
        report(&e, input);
        anyhow::bail!("failed to build {}", output.display());
    }

    println!("{} 成功生成可执行文件: {}", "✅".green(), output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_selects_filter() {
        assert_eq!(default_filter(0), "warn");
        assert_eq!(default_filter(1), "debug");
        assert_eq!(default_filter(2), "trace");
        assert_eq!(default_filter(5), "trace");
    }

    #[test]
    fn test_parse_compile_with_global_verbose() {
        let cli = Cli::try_parse_from([
            "tessera",
            "compile",
            "m.json",
            "--debug-info",
            "-vv",
            "--target",
            "x86_64-unknown-linux-gnu",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Compile {
                input,
                output,
                debug_info,
                target,
            } => {
                assert_eq!(input, PathBuf::from("m.json"));
                assert_eq!(output, PathBuf::from("a.ll"));
                assert!(debug_info);
                assert_eq!(target.as_deref(), Some("x86_64-unknown-linux-gnu"));
            }
            _ => panic!("expected compile"),
        }
    }

    #[test]
    fn test_build_requires_input() {
        assert!(Cli::try_parse_from(["tessera", "build"]).is_err());
    }
}
