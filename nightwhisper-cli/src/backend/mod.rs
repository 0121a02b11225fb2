pub mod file_store;
pub mod proxy;

pub use file_store::FileStore;
pub use proxy::HttpCompletion;

use log::warn;
use nightwhisper_core::{OfflineCompletion, TextCompletion};
use std::time::Duration;

/// Pick the completion backend: the proxy when a URL is given and not offline.
/// A proxy client that cannot be built falls back to offline text.
pub fn completion_backend(
    proxy_url: Option<&str>,
    offline: bool,
    timeout: Duration,
) -> Box<dyn TextCompletion> {
    match proxy_url {
        Some(url) if !offline => match HttpCompletion::new(url, timeout) {
            Ok(client) => Box::new(client),
            Err(err) => {
                warn!("proxy client unavailable, using offline text: {err}");
                Box::new(OfflineCompletion)
            }
        },
        _ => Box::new(OfflineCompletion),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn offline_flag_skips_the_proxy() {
        let backend = completion_backend(Some("http://127.0.0.1:9"), true, Duration::from_millis(50));
        assert_eq!(
            backend.complete("anything").await,
            Err(nightwhisper_core::CompletionError::Offline)
        );
    }

    #[tokio::test]
    async fn proxy_backend_reports_transport_failure() {
        let backend = completion_backend(Some("http://127.0.0.1:9"), false, Duration::from_millis(200));
        assert!(backend.complete("anything").await.is_err());
    }
}
