use crate::{
    config::Config,
    error::{AppError, Result},
    models::user::UserRecord,
};
use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, error, warn};

/// 用户查询接口，头像解析的唯一外部依赖
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserLookup: Send + Sync {
    /// Returns the user record, or an error if the user does not exist or
    /// the directory is unreachable.
    async fn lookup_user(&self, user_id: &str) -> Result<UserRecord>;
}

/// User directory client backed by the account service.
#[derive(Clone)]
pub struct HttpUserDirectory {
    config: Config,
    http_client: Client,
}

impl HttpUserDirectory {
    pub fn new(config: &Config) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config: config.clone(),
            http_client,
        })
    }
}

#[async_trait]
impl UserLookup for HttpUserDirectory {
    async fn lookup_user(&self, user_id: &str) -> Result<UserRecord> {
        let url = format!("{}/api/users/{}", self.config.user_service_url, user_id);

        let mut request = self.http_client.get(&url);
        if let Some(token) = &self.config.user_service_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await.map_err(|e| {
            error!("Failed to fetch user {} from directory: {}", user_id, e);
            AppError::ExternalService("Failed to reach user directory".to_string())
        })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::not_found("User"));
        }

        if !response.status().is_success() {
            warn!("User directory returned error status: {}", response.status());
            return Err(AppError::ExternalService(format!(
                "User directory returned {}",
                response.status()
            )));
        }

        let user: UserRecord = response.json().await.map_err(|e| {
            error!("Failed to parse user directory response: {}", e);
            AppError::ExternalService("Invalid response from user directory".to_string())
        })?;

        Ok(user)
    }
}

/// Process-wide avatar cache keyed by user id.
///
/// Failed lookups are cached as "no avatar" so a broken user record never
/// fails a comment render and is never retried. Each key holds a
/// `OnceCell`, so concurrent first requests for the same user share a
/// single in-flight lookup instead of racing. Entries are never evicted;
/// the key space is the set of commenters seen during one page load.
pub struct AvatarCache {
    lookup: Arc<dyn UserLookup>,
    entries: DashMap<String, Arc<OnceCell<Option<String>>>>,
}

impl AvatarCache {
    pub fn new(lookup: Arc<dyn UserLookup>) -> Self {
        Self {
            lookup,
            entries: DashMap::new(),
        }
    }

    /// Resolves a user id to an avatar URL, if the user has one.
    ///
    /// The empty id means "author unknown" and short-circuits without
    /// touching the directory or the cache.
    pub async fn resolve(&self, user_id: &str) -> Option<String> {
        if user_id.is_empty() {
            return None;
        }

        // 克隆cell后立刻释放分片锁，await期间不持锁
        let cell = self.entries.entry(user_id.to_string()).or_default().clone();

        cell.get_or_init(|| async {
            match self.lookup.lookup_user(user_id).await {
                Ok(user) => user.avatar,
                Err(e) => {
                    debug!("Avatar lookup failed for user {}: {}", user_id, e);
                    None
                }
            }
        })
        .await
        .clone()
    }

    /// Number of user ids resolved so far (settled or in flight).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn record(id: &str, avatar: Option<&str>) -> UserRecord {
        UserRecord {
            id: id.to_string(),
            username: Some("ada".to_string()),
            full_name: None,
            avatar: avatar.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_resolve_hits_lookup_once() {
        let mut lookup = MockUserLookup::new();
        lookup
            .expect_lookup_user()
            .times(1)
            .returning(|id| Ok(record(id, Some("https://cdn/a.png"))));

        let cache = AvatarCache::new(Arc::new(lookup));
        assert_eq!(
            cache.resolve("u1").await,
            Some("https://cdn/a.png".to_string())
        );
        assert_eq!(
            cache.resolve("u1").await,
            Some("https://cdn/a.png".to_string())
        );
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_lookup_is_negative_cached() {
        let mut lookup = MockUserLookup::new();
        lookup
            .expect_lookup_user()
            .times(1)
            .returning(|_| Err(AppError::not_found("User")));

        let cache = AvatarCache::new(Arc::new(lookup));
        assert_eq!(cache.resolve("ghost").await, None);
        assert_eq!(cache.resolve("ghost").await, None);
    }

    #[tokio::test]
    async fn test_record_without_avatar_resolves_to_none() {
        let mut lookup = MockUserLookup::new();
        lookup
            .expect_lookup_user()
            .times(1)
            .returning(|id| Ok(record(id, None)));

        let cache = AvatarCache::new(Arc::new(lookup));
        assert_eq!(cache.resolve("u2").await, None);
        assert_eq!(cache.resolve("u2").await, None);
    }

    #[tokio::test]
    async fn test_empty_id_skips_lookup_and_cache() {
        let mut lookup = MockUserLookup::new();
        lookup.expect_lookup_user().never();

        let cache = AvatarCache::new(Arc::new(lookup));
        assert_eq!(cache.resolve("").await, None);
        assert!(cache.is_empty());
    }

    struct SlowLookup {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl UserLookup for SlowLookup {
        async fn lookup_user(&self, user_id: &str) -> Result<UserRecord> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            Ok(record(user_id, Some("https://cdn/slow.png")))
        }
    }

    #[tokio::test]
    async fn test_concurrent_first_requests_share_one_lookup() {
        let lookup = Arc::new(SlowLookup {
            calls: AtomicUsize::new(0),
        });
        let cache = AvatarCache::new(lookup.clone());

        let (a, b) = tokio::join!(cache.resolve("u1"), cache.resolve("u1"));
        assert_eq!(a, Some("https://cdn/slow.png".to_string()));
        assert_eq!(a, b);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }
}
