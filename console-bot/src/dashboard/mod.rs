//! Dashboard administrative API: login sessions and resource operations.
//!
//! | Endpoint | Method |
//! |---|---|
//! | `/api/auth/login` | POST `{username, password}` |
//! | `/api/stat/restart-core` | POST |
//! | `/api/conversation/list` | GET `?page=&page_size=` |
//! | `/api/conversation/delete` | POST `{user_id, cid}` |
//!
//! Every authenticated call carries `Authorization: Bearer <token>`.

pub mod client;
pub mod session;
pub mod types;

pub use client::{http_client, DashboardClient};
pub use session::{Session, SessionProvider};
pub use types::{ApiEnvelope, ConversationRecord};
