use crate::{
    config::Config,
    error::{AppError, Result},
    models::comment::*,
    services::user::{AvatarCache, HttpUserDirectory, UserLookup},
    utils::fields,
};
use chrono::{DateTime, Utc};
use futures::future::{self, BoxFuture, FutureExt};
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};
use validator::Validate;

/// Comment engine for the blog frontend.
///
/// Takes the comment API's raw payloads, including the legacy field names
/// still emitted for old records, and produces canonical comment trees with
/// resolved author avatars. Raw shapes never escape this service.
#[derive(Clone)]
pub struct CommentService {
    config: Config,
    http_client: Client,
    avatars: Arc<AvatarCache>,
}

impl CommentService {
    pub async fn new(config: &Config) -> Result<Self> {
        let directory = HttpUserDirectory::new(config)?;
        Self::with_lookup(config, Arc::new(directory))
    }

    /// Builds the service around a custom user lookup.
    pub fn with_lookup(config: &Config, lookup: Arc<dyn UserLookup>) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config: config.clone(),
            http_client,
            avatars: Arc::new(AvatarCache::new(lookup)),
        })
    }

    /// Loads one page of top-level comments for a blog post.
    ///
    /// Never fails: transport errors and undecodable responses degrade to an
    /// empty result so the hosting page still renders.
    pub async fn get_by_blog_id(
        &self,
        blog_id: &str,
        params: CommentListParams,
    ) -> CommentListResult {
        debug!("Loading comments for blog: {}", blog_id);
        let requested_page = params.page.unwrap_or(1);
        let params = CommentListParams {
            page: params.page,
            limit: params
                .limit
                .or(Some(self.config.default_comments_per_page)),
        };

        let raw = match self.fetch_comment_page(blog_id, &params).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to load comments for blog {}: {}", blog_id, e);
                return CommentListResult::empty(requested_page);
            }
        };

        // 兼容两种响应形态：裸数组或带分页字段的对象
        let empty = Vec::new();
        let items: &Vec<Value> = raw
            .as_array()
            .or_else(|| fields::array_field(&raw, "comments"))
            .unwrap_or(&empty);

        let comments =
            future::join_all(items.iter().map(|item| self.normalize_comment(item))).await;

        CommentListResult {
            total: fields::u64_field(&raw, "total").unwrap_or(comments.len() as u64),
            current_page: fields::u64_field(&raw, "currentPage")
                .map(|p| p as u32)
                .unwrap_or(requested_page),
            total_pages: fields::u64_field(&raw, "totalPages")
                .map(|p| p as u32)
                .unwrap_or(1),
            comments,
        }
    }

    pub async fn create_comment(&self, request: CreateCommentRequest) -> Result<Comment> {
        debug!("Creating comment for blog: {}", request.blog_id);
        request.validate().map_err(AppError::ValidatorError)?;
        self.check_content_length(&request.content)?;

        let url = format!("{}/api/comments", self.config.api_base_url);
        let response = self.http_client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "Comment creation returned {}",
                response.status()
            )));
        }

        let raw: Value = response.json().await?;
        Ok(self.normalize_comment(&raw).await)
    }

    pub async fn update_comment(
        &self,
        comment_id: &str,
        request: UpdateCommentRequest,
    ) -> Result<Comment> {
        request.validate().map_err(AppError::ValidatorError)?;
        self.check_content_length(&request.content)?;

        match self.send_update(comment_id, &request).await {
            Ok(raw) => Ok(self.normalize_comment(&raw).await),
            Err(e) => {
                error!("Failed to update comment {}: {}", comment_id, e);
                Err(e)
            }
        }
    }

    pub async fn delete_comment(&self, comment_id: &str) -> Result<()> {
        match self.send_delete(comment_id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!("Failed to delete comment {}: {}", comment_id, e);
                Err(e)
            }
        }
    }

    fn check_content_length(&self, content: &str) -> Result<()> {
        if content.chars().count() > self.config.max_comment_length {
            return Err(AppError::bad_request("Comment content is too long"));
        }
        Ok(())
    }

    // HTTP helpers

    async fn fetch_comment_page(
        &self,
        blog_id: &str,
        params: &CommentListParams,
    ) -> Result<Value> {
        let url = format!("{}/api/blogs/{}/comments", self.config.api_base_url, blog_id);
        let response = self.http_client.get(&url).query(params).send().await?;

        if !response.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "Comment list request returned {}",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }

    async fn send_update(&self, comment_id: &str, request: &UpdateCommentRequest) -> Result<Value> {
        let url = format!("{}/api/comments/{}", self.config.api_base_url, comment_id);
        let response = self.http_client.put(&url).json(request).send().await?;

        if !response.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "Comment update returned {}",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }

    async fn send_delete(&self, comment_id: &str) -> Result<()> {
        let url = format!("{}/api/comments/{}", self.config.api_base_url, comment_id);
        let response = self.http_client.delete(&url).send().await?;

        if !response.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "Comment deletion returned {}",
                response.status()
            )));
        }

        Ok(())
    }

    // Normalization

    /// Normalizes one raw comment node and its reply subtree.
    ///
    /// Sibling replies are resolved concurrently; their author lookups
    /// overlap and share the avatar cache, but the output sequence keeps
    /// the server order.
    fn normalize_comment<'a>(&'a self, raw: &'a Value) -> BoxFuture<'a, Comment> {
        async move {
            let author_raw = fields::object_field_compat(raw, "author", "User");
            let author = self.normalize_author(author_raw).await;

            let replies = match fields::array_field(raw, "replies") {
                Some(items) => {
                    future::join_all(items.iter().map(|item| self.normalize_comment(item))).await
                }
                None => Vec::new(),
            };

            Comment {
                id: fields::string_field(raw, "id").unwrap_or_default(),
                blog_id: fields::string_field_compat(raw, "blogId", "postId").unwrap_or_default(),
                content: fields::string_field(raw, "content").unwrap_or_default(),
                author,
                created_at: parse_timestamp(fields::string_field(raw, "createdAt"))
                    .unwrap_or_else(Utc::now),
                updated_at: parse_timestamp(fields::string_field(raw, "updatedAt")),
                parent_id: fields::string_field(raw, "parentId"),
                replies,
            }
        }
        .boxed()
    }

    async fn normalize_author(&self, raw: Option<&Value>) -> CommentAuthor {
        let id = raw
            .and_then(|a| fields::string_field(a, "id"))
            .unwrap_or_default();

        // 无法识别作者时不查询头像
        let avatar = if id.is_empty() {
            None
        } else {
            self.avatars.resolve(&id).await
        };

        CommentAuthor {
            id,
            username: raw
                .and_then(|a| fields::string_field(a, "username"))
                .unwrap_or_else(|| "Unknown".to_string()),
            full_name: raw.and_then(|a| fields::string_field(a, "fullName")),
            avatar,
        }
    }
}

/// RFC 3339 timestamps only; anything else counts as absent.
fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
