pub mod comment;
pub mod user;

// 重新导出常用类型
pub use comment::CommentService;
pub use user::{AvatarCache, HttpUserDirectory, UserLookup};
