//! Benchmarks compilation of a representative multi-schema,
//! multi-collection source at a fixed seed, covering the parser,
//! evaluator and record/dataset generator together end to end.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use vague::{compile, CompileOptions};

const FLAT_SOURCE: &str = r#"
    schema Customer {
        id: unique("customer.id", int in 1..100000),
        name: string,
        segment: 0.6: "retail" | 0.3: "business" | 0.1: "enterprise"
    }

    dataset Customers {
        customers: 500 of Customer
    }
"#;

const NESTED_SOURCE: &str = r#"
    schema Line {
        amount: decimal in 1..500,
        quantity: int in 1..20
    }

    schema Invoice {
        id: unique("invoice.id", int in 1..1000000),
        lines: 5 of Line,
        total: = sum(lines.amount),
        assume total > 0
    }

    dataset Invoices {
        invoices: 200 of Invoice
    }
"#;

fn bench_flat_dataset(c: &mut Criterion) {
    let options = CompileOptions {
        seed: Some(42),
        ..Default::default()
    };
    c.bench_function("compile_flat_500_customers", |b| {
        b.iter(|| compile(black_box(FLAT_SOURCE), options).expect("valid source"))
    });
}

fn bench_nested_dataset(c: &mut Criterion) {
    let options = CompileOptions {
        seed: Some(42),
        ..Default::default()
    };
    c.bench_function("compile_nested_200_invoices", |b| {
        b.iter(|| compile(black_box(NESTED_SOURCE), options).expect("valid source"))
    });
}

criterion_group!(benches, bench_flat_dataset, bench_nested_dataset);
criterion_main!(benches);
