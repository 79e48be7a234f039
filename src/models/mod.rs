mod article;
mod change;

pub use article::{Article, IncomingArticle};
pub use change::{ChangeEvent, ChangeType};
