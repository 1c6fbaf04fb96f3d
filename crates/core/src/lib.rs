pub mod auth;
pub mod config;
pub mod queue;
pub mod testing;
pub mod ticket;

pub use auth::{
    create_authenticator, ApiKeyAuthenticator, AuthError, AuthRequest, Authenticator, Identity,
    NoneAuthenticator,
};
pub use config::{
    load_config, load_config_from_str, validate_config, AuthConfig, AuthMethod, Config,
    ConfigError, DatabaseConfig, QueueConfig, SanitizedConfig, ServerConfig,
};
pub use queue::{Advanced, QueueError, QueueService, QueueSubscription, RemovalScheduler};
pub use ticket::{
    ChangeKind, IssueTicketRequest, ScheduledRemoval, SqliteTicketStore, Ticket, TicketChange,
    TicketError, TicketFilter, TicketStatus, TicketStore,
};
