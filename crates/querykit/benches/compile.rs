use async_trait::async_trait;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use querykit::dialect::{Postgres, Sqlite};
use querykit::{
    ColumnOptions, DataSource, Dialect, Driver, EntityMetadata, Filter, OrmResult, QueryError,
    QueryRunner, SqlQb, WhereExpression,
};
use std::sync::Arc;

/// Compiling never needs a connection.
struct Offline(&'static dyn Dialect);

#[async_trait]
impl Driver for Offline {
    fn dialect(&self) -> &dyn Dialect {
        self.0
    }

    async fn create_query_runner(&self) -> OrmResult<Arc<dyn QueryRunner>> {
        Err(QueryError::Connection("offline".to_string()))
    }
}

fn data_source(dialect: &'static dyn Dialect) -> DataSource {
    let category = EntityMetadata::builder("Category")
        .table("category")
        .primary_column("id", ColumnOptions::new().column_type("integer"))
        .column("name", ColumnOptions::new().column_type("varchar"))
        .build()
        .unwrap();
    DataSource::new(Offline(dialect)).with_metadata(category)
}

fn bench_delete_in_ids(c: &mut Criterion) {
    let mut group = c.benchmark_group("delete/where_in_ids");
    let ds = data_source(&Postgres);

    for n in [1, 10, 100, 1000] {
        let ids: Vec<i64> = (0..n).collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &ids, |b, ids| {
            b.iter(|| {
                let qb = ds.delete().from("Category").where_in_ids(ids.clone());
                black_box(qb.get_query_and_parameters().unwrap());
            });
        });
    }

    group.finish();
}

fn bench_spread_parameter(c: &mut Criterion) {
    let mut group = c.benchmark_group("delete/spread");

    for (name, dialect) in [("postgres", &Postgres as &'static dyn Dialect), ("sqlite", &Sqlite)] {
        let ds = data_source(dialect);
        let names: Vec<String> = (0..50).map(|i| format!("Category #{i}")).collect();
        group.bench_function(name, |b| {
            b.iter(|| {
                let qb = ds
                    .delete()
                    .from("Category")
                    .where_("name IN (:...names)")
                    .set_parameter("names", names.clone());
                black_box(qb.get_query_and_parameters().unwrap());
            });
        });
    }

    group.finish();
}

fn bench_select_filters(c: &mut Criterion) {
    let mut group = c.benchmark_group("select/filters");
    let ds = data_source(&Postgres);

    for n in [1, 5, 25] {
        let filters: Vec<Filter> = (0..n)
            .map(|i| Filter::new().eq("name", format!("Category #{i}")).eq("id", i as i64))
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &filters, |b, filters| {
            b.iter(|| {
                let qb = ds
                    .select(["c.id", "c.name"])
                    .from("Category", "c")
                    .where_(filters.clone())
                    .limit(10);
                black_box(qb.get_query_and_parameters().unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_delete_in_ids,
    bench_spread_parameter,
    bench_select_filters
);
criterion_main!(benches);
