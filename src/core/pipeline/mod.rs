use tokio::sync::watch;

pub mod building;
pub mod reporting;
pub mod scoring;
pub mod worker;

/// Resolves once shutdown has been requested. A dropped sender means nobody
/// can request it anymore, so the future never resolves in that case.
pub async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
