//! # Backstage
//!
//! Client-side entity cache and sync engine for the concert ticketing admin
//! dashboard.
//!
//! The store holds one cache slice per entity kind (concerts, orders,
//! organizers, users, transactions) plus the session. Every slice is a
//! reducer; remote operations are gateway effects whose responses are fed
//! back as actions. Logging out, or any request rejected with a 401, resets
//! every slice in the same reduction.
//!
//! ## Example
//!
//! ```no_run
//! use backstage::{Backstage, BackstageConfig, Concert, Credentials, QueryParams};
//!
//! # async fn run() -> Result<(), backstage::BackstageError> {
//! let config = BackstageConfig::from_env()?;
//! backstage::telemetry::init_tracing(&config.log_directive);
//!
//! let store = Backstage::from_config(&config)?;
//! if !store.restore().await? {
//!     store.login(Credentials::new("organizer@example.com", "secret")).await?;
//! }
//!
//! store.list::<Concert>(QueryParams::default()).await?;
//! let titles: Vec<String> = store
//!     .state(|s| s.concerts.items.iter().map(|c| c.id.clone()).collect())
//!     .await;
//! println!("{titles:?}");
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod config;
pub mod entities;
pub mod envelope;
pub mod environment;
pub mod error;
pub mod facade;
pub mod kind;
pub mod record;
pub mod resolver;
pub mod session;
pub mod slice;
pub mod telemetry;
pub mod views;

#[cfg(test)]
mod test_support;

pub use app::{AppAction, AppReducer, AppSlice, AppState};
pub use config::{BackstageConfig, ConfigError};
pub use entities::{
    Concert, ConcertStatus, Order, OrderStatus, Organizer, OrganizerStatus, Transaction, TransactionStatus, User,
    UserStatus,
};
pub use envelope::PageInfo;
pub use environment::StoreEnvironment;
pub use error::{BackstageError, ErrorInfo, FailureKind};
pub use facade::{AppStore, Backstage};
pub use kind::{EntityKind, EntityStatus};
pub use record::Record;
pub use resolver::{resolve_list_query, Identity, ListQuery, ListVariant, QueryParams, ResolveError, Role};
pub use session::{Credentials, Registration, SessionAction, SessionPhase, SessionState};
pub use slice::{EntityAction, EntityReducer, EntityState, Operation, Ticket};
pub use views::{DashboardSummary, GroupTotal, StatusHistogram};
