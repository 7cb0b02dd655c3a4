use anyhow::Context;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use sea_query::Value;
use tracing_subscriber::EnvFilter;

use query_dispatcher::command::Command;
use query_dispatcher::config::CatalogConfig;
use query_dispatcher::schema::StaticCatalog;
use query_dispatcher::statement::{Statement, StatementGenerator};

const CATALOG_FILE: &str = "schema.json";

/// 加载实体目录，失败时使用空目录（表名退化为小写实体名）
fn load_catalog() -> StaticCatalog {
    match CatalogConfig::from_json_file(CATALOG_FILE) {
        Ok(config) => {
            println!("✅ 使用JSON配置文件: {}", CATALOG_FILE);
            println!("✅ 加载了 {} 个实体配置", config.entities.len());
            config.into_catalog()
        }
        Err(e) => {
            println!("⚠️ 无法加载JSON配置文件 ({}), 使用空目录", e);
            StaticCatalog::new()
        }
    }
}

/// 参数值的可读形式
fn display_value(value: &Value) -> String {
    match value {
        Value::String(Some(s)) => format!("'{}'", s),
        Value::BigInt(Some(n)) => n.to_string(),
        Value::Double(Some(f)) => f.to_string(),
        Value::Bool(Some(b)) => b.to_string(),
        Value::String(None) | Value::BigInt(None) | Value::Double(None) | Value::Bool(None) => {
            "NULL".to_string()
        }
        other => format!("{:?}", other),
    }
}

fn print_statement(index: usize, statement: &Statement) {
    println!("\n[语句 {}]:", index + 1);
    println!("{}", statement.text);
    if !statement.parameters.is_empty() {
        println!("[参数]:");
        for (name, value) in statement.parameters.iter() {
            println!("  @{} = {}", name, display_value(value));
        }
    }
    if statement.must_affect_rows {
        println!("(必须影响至少一行)");
    }
}

/// 解析一行JSON命令并打印生成的语句
fn handle_line(generator: &StatementGenerator<'_>, line: &str) -> anyhow::Result<()> {
    let command: Command = serde_json::from_str(line).context("无法解析JSON命令")?;
    let statements = generator.generate(&command).context("生成SQL失败")?;
    for (index, statement) in statements.iter().enumerate() {
        print_statement(index, statement);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("query_dispatcher=info")),
        )
        .init();

    println!("--- Query Dispatcher: 查询对象到 SQLite 语句 ---");
    println!("\n[配置信息]:");
    let catalog = load_catalog();
    let generator = StatementGenerator::new(&catalog);

    println!("\n每行输入一个JSON命令, 例如:");
    println!(r#"{{"kind": "select", "query": {{"entity": "User", "paging": {{"offset": 0, "size": 10}}}}}}"#);
    println!("输入 exit 或按 Ctrl-D 退出");

    let mut editor = DefaultEditor::new()?;
    loop {
        match editor.readline("query> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "exit" || line == "quit" {
                    break;
                }
                let _ = editor.add_history_entry(line);
                if let Err(e) = handle_line(&generator, line) {
                    println!("✗ {:#}", e);
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
