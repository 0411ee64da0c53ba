pub mod conversation_service;
pub mod direct_resolver;
pub mod message_service;
pub mod notification_service;
pub mod profile_service;
pub mod social_graph;
pub mod storage;

pub use conversation_service::ConversationService;
pub use direct_resolver::DirectResolver;
pub use message_service::MessageService;
pub use notification_service::{NewNotification, NotificationService};
pub use profile_service::ProfileService;
pub use social_graph::SocialGraphService;
pub use storage::{LocalMediaStorage, MediaStorage};
