pub mod config;
pub mod conversation;
pub mod error;
pub mod notice;
pub mod protocol;
pub mod request;
pub mod router;
pub mod settings;
pub mod status;
pub mod telemetry;
pub mod transport;

pub use config::ClientConfig;
pub use conversation::{ChatMessage, ConversationStore, Role};
pub use error::ClientError;
pub use notice::{Notice, NoticeKind, NoticeSink};
pub use protocol::TransportEvent;
pub use request::{HttpRequestChannel, RequestTransport};
pub use router::MessageRouter;
pub use settings::{Settings, SettingsStore, TransportPreference};
pub use status::{active_channel, ActiveChannel, ConnectionStatusPublisher};
pub use transport::{ConnectionState, RetryPolicy, TransportManager};
