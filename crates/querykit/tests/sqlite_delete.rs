//! End-to-end scenarios against an in-memory SQLite database.

#![cfg(feature = "sqlite")]

mod common;

use common::{JournalSubscriber, Journal, category};
use querykit::{
    DataSource, Filter, MutationQb, OrmResult, QueryError, QueryRunner, SqlQb, SqliteDriver,
    Value, WhereExpression,
};
use std::sync::Arc;
use std::time::Duration;

async fn setup() -> OrmResult<DataSource> {
    let driver = SqliteDriver::memory()?;
    driver
        .execute_batch(
            "CREATE TABLE category (id INTEGER PRIMARY KEY AUTOINCREMENT, name VARCHAR NOT NULL);
             INSERT INTO category (name) VALUES ('Category #1'), ('Category #2'), ('Category #3');",
        )
        .await?;
    Ok(DataSource::new(driver).with_metadata(category()))
}

async fn count(ds: &DataSource) -> OrmResult<usize> {
    Ok(ds
        .select(["c.id"])
        .from("Category", "c")
        .get_many()
        .await?
        .len())
}

#[tokio::test]
async fn delete_by_filter() -> OrmResult<()> {
    let ds = setup().await?;

    let result = ds
        .delete()
        .from("Category")
        .where_(Filter::new().eq("name", "Category #1"))
        .execute()
        .await?;

    assert_eq!(result.affected, Some(1));
    assert_eq!(result.raw, None);
    assert_eq!(count(&ds).await?, 2);
    Ok(())
}

#[tokio::test]
async fn delete_returning_ids() -> OrmResult<()> {
    let ds = setup().await?;

    let result = ds
        .delete()
        .from("Category")
        .where_("name = :name")
        .set_parameter("name", "Category #2")
        .returning(["id"])
        .execute()
        .await?;

    let rows = result.raw.expect("rows from RETURNING");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].try_get::<i64>("id")?, 2);
    assert_eq!(result.affected, Some(1));
    Ok(())
}

#[tokio::test]
async fn delete_where_in_ids() -> OrmResult<()> {
    let ds = setup().await?;

    let result = ds
        .delete()
        .from("Category")
        .where_in_ids([1, 2, 3])
        .execute()
        .await?;

    assert_eq!(result.affected, Some(3));
    assert_eq!(count(&ds).await?, 0);
    Ok(())
}

#[tokio::test]
async fn delete_empty_ids_matches_nothing() -> OrmResult<()> {
    let ds = setup().await?;

    let result = ds
        .delete()
        .from("Category")
        .where_in_ids(Vec::<i64>::new())
        .execute()
        .await?;

    assert_eq!(result.affected, Some(0));
    assert_eq!(count(&ds).await?, 3);
    Ok(())
}

#[tokio::test]
async fn delete_with_spread_parameter() -> OrmResult<()> {
    let ds = setup().await?;

    let result = ds
        .delete()
        .from("Category")
        .where_("name IN (:...names)")
        .set_parameter("names", vec!["Category #1", "Category #3"])
        .execute()
        .await?;

    assert_eq!(result.affected, Some(2));
    Ok(())
}

#[tokio::test]
async fn hooks_fire_around_sqlite_delete() -> OrmResult<()> {
    let journal = Arc::new(Journal::default());
    let ds = setup()
        .await?
        .with_subscriber(Arc::new(JournalSubscriber::new(&journal)));

    ds.delete().from("Category").where_in_ids(1).execute().await?;

    assert_eq!(
        journal.events(),
        vec!["before_remove:Category", "after_remove:Category"]
    );
    Ok(())
}

#[tokio::test]
async fn failed_transaction_keeps_rows() -> OrmResult<()> {
    let ds = setup().await?;

    let result: OrmResult<()> = ds
        .transaction(|runner| {
            let ds = ds.clone();
            async move {
                ds.delete()
                    .from("Category")
                    .where_in_ids([1, 2])
                    .with_query_runner(runner)
                    .execute()
                    .await?;
                Err::<(), _>(QueryError::Other("abort".to_string()))
            }
        })
        .await;

    assert!(result.is_err());
    assert_eq!(count(&ds).await?, 3);
    Ok(())
}

#[tokio::test]
async fn open_transaction_is_not_shared_with_other_runners() -> OrmResult<()> {
    let ds = setup().await?;

    let held = ds.create_query_runner().await?;
    held.start_transaction().await?;
    ds.delete()
        .from("Category")
        .where_in_ids(1)
        .with_query_runner(Arc::clone(&held))
        .execute()
        .await?;

    let owned = tokio::spawn({
        let ds = ds.clone();
        async move {
            ds.delete()
                .from("Category")
                .where_in_ids(2)
                .use_transaction(true)
                .execute()
                .await
        }
    });
    let plain = tokio::spawn({
        let ds = ds.clone();
        async move { ds.delete().from("Category").where_in_ids(3).execute().await }
    });

    // Both wait for the held transaction instead of joining it.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!owned.is_finished());
    assert!(!plain.is_finished());

    held.rollback_transaction().await?;
    held.release().await?;

    let owned = owned.await.expect("owned delete task")?;
    let plain = plain.await.expect("plain delete task")?;
    assert_eq!(owned.affected, Some(1));
    assert_eq!(plain.affected, Some(1));

    // Row 1 came back with the rollback; rows 2 and 3 stay deleted.
    let rows = ds.select(["c.id"]).from("Category", "c").get_many().await?;
    let ids: Vec<i64> = rows
        .iter()
        .map(|row| row.try_get::<i64>("id"))
        .collect::<OrmResult<_>>()?;
    assert_eq!(ids, vec![1]);
    Ok(())
}

#[tokio::test]
async fn released_runner_rolls_back_its_transaction() -> OrmResult<()> {
    let ds = setup().await?;

    let runner = ds.create_query_runner().await?;
    runner.start_transaction().await?;
    runner.query("DELETE FROM category", &[]).await?;
    runner.release().await?;

    assert!(!runner.is_transaction_active());
    assert_eq!(count(&ds).await?, 3);
    Ok(())
}

#[tokio::test]
async fn insert_update_select() -> OrmResult<()> {
    let ds = setup().await?;

    let inserted = ds
        .insert()
        .into("Category")
        .values([("name", "Category #4")])
        .returning(["id"])
        .execute()
        .await?;
    let id = inserted.identifiers[0].try_get::<i64>("id")?;
    assert_eq!(id, 4);

    let updated = ds
        .update("Category")
        .set("name", "Renamed")
        .where_in_ids(id)
        .execute()
        .await?;
    assert_eq!(updated.affected, Some(1));

    let row = ds
        .select(["c.name"])
        .from("Category", "c")
        .where_in_ids(id)
        .get_one()
        .await?
        .expect("row exists");
    assert_eq!(row.get("name"), Some(&Value::from("Renamed")));
    Ok(())
}
