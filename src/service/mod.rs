//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Every operation takes the caller's identity as an explicit
//! `Option<UserId>`; services validate input, call the stores and
//! shape the results for that caller.

mod comment;
mod fanout;
mod notification;
mod post;
mod timeline;
mod user;
pub mod validation;

pub use comment::{Comment, CommentService};
pub use fanout::{FanoutReport, FanoutSettings, FanoutSignal, FanoutWorker};
pub use notification::{Notification, NotificationService};
pub use post::{Post, PostService};
pub use timeline::{TimelineItem, TimelineService};
pub use user::{LoginOutput, User, UserProfile, UserService};
