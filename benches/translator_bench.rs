use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use query_dispatcher::ast::{
    CombineOperator, Condition, Connector, Criterion as Filter, Join, JoinKind, Literal, Operator,
    Query, RecursionDirection,
};
use query_dispatcher::command::{AggregateFunction, Command, DeleteCommand, UpdateCommand};
use query_dispatcher::schema::{EntitySchema, FieldRole, StaticCatalog};
use query_dispatcher::statement::StatementGenerator;
use query_dispatcher::translator::TranslationContext;

// 创建基准测试使用的实体目录
fn create_catalog() -> StaticCatalog {
    StaticCatalog::new()
        .with_entity(
            "User",
            EntitySchema::new("users")
                .field("Id", &[FieldRole::PrimaryKey])
                .field("Name", &[])
                .field("Age", &[])
                .field("Status", &[])
                .relation("Order", "Id", "UserId"),
        )
        .with_entity(
            "Order",
            EntitySchema::new("orders")
                .field("Id", &[FieldRole::PrimaryKey, FieldRole::Increment])
                .field("UserId", &[])
                .field("Amount", &[]),
        )
        .with_entity(
            "Category",
            EntitySchema::new("category")
                .field("Id", &[FieldRole::PrimaryKey])
                .field("ParentId", &[])
                .field("Name", &[]),
        )
}

fn test_queries() -> Vec<(&'static str, Query)> {
    let status = Condition::group(
        Connector::And,
        vec![
            Filter::new("Status", Operator::Equal, "active").into(),
            Filter::new("Status", Operator::Equal, "pending")
                .connector(Connector::Or)
                .into(),
        ],
    );
    let ids: Vec<Literal> = (1..=50).map(Literal::Number).collect();

    vec![
        ("simple", Query::new("User").and("Age", Operator::GreaterThan, 18)),
        (
            "nested",
            Query::new("User")
                .and("Age", Operator::GreaterThan, 18)
                .filter(status)
                .and("Id", Operator::In, ids)
                .sort("Name", true)
                .page(10, 5),
        ),
        (
            "joined",
            Query::new("User").join(Join::new(
                JoinKind::Inner,
                Query::new("Order").and("Amount", Operator::GreaterThan, 100),
            )),
        ),
        (
            "combined",
            Query::new("User")
                .and("Age", Operator::GreaterThan, 60)
                .combine(
                    CombineOperator::Union,
                    Query::new("User").and("Age", Operator::LessThan, 10),
                ),
        ),
        (
            "recursive",
            Query::new("Category")
                .and("Id", Operator::Equal, 7)
                .recurse(RecursionDirection::Ancestors, "Id", "ParentId"),
        ),
    ]
}

// 基准测试：查询翻译性能
fn benchmark_translate(c: &mut Criterion) {
    let catalog = create_catalog();
    let mut group = c.benchmark_group("translate_performance");

    for (name, query) in test_queries() {
        group.bench_with_input(BenchmarkId::new("translate", name), &query, |b, query| {
            let mut ctx = TranslationContext::new(&catalog);
            b.iter(|| match ctx.translate(black_box(query)) {
                Ok(result) => black_box(result),
                Err(_) => panic!("翻译失败"),
            })
        });
    }

    group.finish();
}

// 基准测试：完整语句生成
fn benchmark_generate(c: &mut Criterion) {
    let catalog = create_catalog();
    let generator = StatementGenerator::new(&catalog);

    let mut commands: Vec<(&'static str, Command)> = test_queries()
        .into_iter()
        .map(|(name, query)| (name, Command::select(query)))
        .collect();
    commands.push((
        "aggregate_combined",
        Command::Aggregate {
            function: AggregateFunction::Count,
            query: Query::new("User").combine(
                CombineOperator::UnionAll,
                Query::new("User").and("Age", Operator::LessThan, 10),
            ),
        },
    ));
    commands.push((
        "update_joined",
        Command::Update(UpdateCommand::new("User").set("Status", "vip").filter(
            Query::new("User").join(Join::new(JoinKind::Inner, Query::new("Order"))),
        )),
    ));
    commands.push((
        "delete_direct",
        Command::Delete(
            DeleteCommand::new("Order").filter(Query::new("Order").and("Amount", Operator::Equal, 0)),
        ),
    ));

    let mut group = c.benchmark_group("statement_generation");

    for (name, command) in commands {
        group.bench_with_input(BenchmarkId::new("generate", name), &command, |b, command| {
            b.iter(|| match generator.generate(black_box(command)) {
                Ok(statements) => black_box(statements),
                Err(_) => panic!("生成失败"),
            })
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_translate, benchmark_generate);
criterion_main!(benches);
