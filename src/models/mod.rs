pub mod conversation;
pub mod message;
pub mod notification;
pub mod user;

pub use conversation::{Conversation, ConversationKind, ConversationSummary, Participant};
pub use message::{Message, MessageDto, MessageKind, MessagePayload};
pub use notification::{
    ActorProfile, Notification, NotificationKind, NotificationSummary, SummaryGroup,
};
pub use user::UserProfile;
