pub mod comment;
pub mod options;
pub mod placement;

pub use comment::{Color, Comment, CommentMode};
pub use options::EngineOptions;
pub use placement::{Motion, Placement, Pose, TransformSpec};
