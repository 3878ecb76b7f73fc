//! Transaction helper that keeps the caller's error type.

use futures::future::BoxFuture;
use sea_orm::{DatabaseConnection, DatabaseTransaction, DbErr, TransactionError, TransactionTrait};

/// Runs `f` inside a transaction: commit on `Ok`, rollback on `Err`.
///
/// Errors returned by `f` come back unchanged, so typed failures raised in the
/// middle of a transaction survive the rollback. Failures to begin or commit
/// are converted through `From<DbErr>`.
///
/// ```rust,ignore
/// let receipt = with_transaction(&db, |txn| {
///     Box::pin(async move {
///         debit_wallet(txn, user_id, total).await?;
///         clear_cart(txn, cart_id).await?;
///         Ok(receipt)
///     })
/// })
/// .await?;
/// ```
pub async fn with_transaction<F, T, E>(db: &DatabaseConnection, f: F) -> Result<T, E>
where
    F: for<'c> FnOnce(&'c DatabaseTransaction) -> BoxFuture<'c, Result<T, E>> + Send,
    T: Send,
    E: std::error::Error + From<DbErr> + Send,
{
    db.transaction(f).await.map_err(|e| match e {
        TransactionError::Connection(db_err) => E::from(db_err),
        TransactionError::Transaction(err) => err,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ConnectOptions, ConnectionTrait, Database, Statement};

    #[derive(Debug, thiserror::Error)]
    enum TestError {
        #[error("rejected")]
        Rejected,
        #[error(transparent)]
        Db(#[from] DbErr),
    }

    async fn db() -> DatabaseConnection {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1);
        let db = Database::connect(opt).await.unwrap();
        db.execute_unprepared("CREATE TABLE t (v INTEGER NOT NULL)")
            .await
            .unwrap();
        db
    }

    async fn count(db: &DatabaseConnection) -> i64 {
        let row = db
            .query_one(Statement::from_string(
                db.get_database_backend(),
                "SELECT COUNT(*) AS n FROM t",
            ))
            .await
            .unwrap()
            .unwrap();
        row.try_get("", "n").unwrap()
    }

    #[tokio::test]
    async fn commits_on_ok() {
        let db = db().await;
        let result: Result<(), TestError> = with_transaction(&db, |txn| {
            Box::pin(async move {
                txn.execute_unprepared("INSERT INTO t (v) VALUES (1)").await?;
                Ok(())
            })
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(count(&db).await, 1);
    }

    #[tokio::test]
    async fn rolls_back_and_keeps_typed_error() {
        let db = db().await;
        let result: Result<(), TestError> = with_transaction(&db, |txn| {
            Box::pin(async move {
                txn.execute_unprepared("INSERT INTO t (v) VALUES (1)").await?;
                Err(TestError::Rejected)
            })
        })
        .await;
        assert!(matches!(result, Err(TestError::Rejected)));
        assert_eq!(count(&db).await, 0);
    }
}
