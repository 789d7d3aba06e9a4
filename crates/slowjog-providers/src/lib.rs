//! Calendar export backends.
//!
//! - [`CalendarExporter`]: the trait every backend implements
//! - [`google::GoogleExporter`]: Google Calendar over OAuth 2.0
//! - [`ProviderError`]: error taxonomy shared by all backends
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  /auth/google        ┌────────────────┐
//! │   browser    │ ───────────────────▶ │ Google consent │
//! └──────┬───────┘                      └───────┬────────┘
//!        │ /create-event                        │ code + state
//!        ▼                                      ▼
//! ┌──────────────┐  CalendarExporter    ┌────────────────┐
//! │ slowjog      │ ───────────────────▶ │ GoogleExporter │
//! │ server       │  tokens per session  └───────┬────────┘
//! └──────────────┘                              │ events.insert
//!                                               ▼
//!                                       ┌────────────────┐
//!                                       │ Calendar v3    │
//!                                       └────────────────┘
//! ```

pub mod error;
pub mod exporter;
pub mod google;

pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use exporter::{BoxFuture, CalendarExporter, ExportReceipt, NewEvent};
pub use google::TokenInfo;
