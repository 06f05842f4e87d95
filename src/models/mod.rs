pub mod comment;
pub mod user;

// 重新导出常用类型
pub use comment::{
    Comment, CommentAuthor, CommentListParams, CommentListResult, CreateCommentRequest,
    UpdateCommentRequest,
};
pub use user::UserRecord;
