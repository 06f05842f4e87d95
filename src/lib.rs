//! Comment thread normalization and author resolution for the blog
//! frontend.
//!
//! The comment API returns heterogeneous payloads: old records use legacy
//! field names (`postId`, `User`), partial records drop fields entirely, and
//! author avatars live in a separate user directory. This crate turns those
//! payloads into canonical [`models::Comment`] trees, resolving avatars
//! through a process-wide cache so repeated authors inside a deep thread
//! cost one directory hit.
//!
//! Reads never fail — a broken comment fetch degrades to an empty page —
//! while writes surface their errors, so callers can tell "nothing
//! happened" from "no comments".

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::{AppError, Result};
pub use models::{
    Comment, CommentAuthor, CommentListParams, CommentListResult, CreateCommentRequest,
    UpdateCommentRequest, UserRecord,
};
pub use services::{AvatarCache, CommentService, HttpUserDirectory, UserLookup};
