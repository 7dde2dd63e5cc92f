use txflow::{Propagation, Session, TransactionManager, TxContext, TxError};

mod support;

async fn step_two(_cx: TxContext, session: Session) -> Result<(), TxError> {
    support::insert_user(&session, "user_2").await
}

#[tokio::test]
async fn repro() {
    let Some(db) = support::setup_test_pool().await else { return; };
    let tm = TransactionManager::new(db.clone_pool());
    let tm = &tm;

    let result = tm
        .transaction(&TxContext::new(), &[Propagation::Required], |cx, session| async move {
            support::insert_user(&session, "user_1").await?;

            tm.transaction(&cx, &[Propagation::Required], step_two).await?;

            Ok(())
        })
        .await;
    let _ = result;
}
