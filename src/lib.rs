// Purse Tracker - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod forms;
pub mod import;
pub mod logging;
pub mod mail;
pub mod query;
pub mod recurrence;
pub mod summary;
pub mod tags;
pub mod tracker;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use config::{Config, ConfigError};
pub use db::{
    Event,
    open_database, open_in_memory, setup_database,
    insert_event, record_event, get_events_for_entity,
};
pub use entities::{
    Expenditure, ExpenditureFilter, NewExpenditure,
    Purse,
    Registration, RegistrationKind,
    NewUser, User,
};
pub use error::{Result, TrackerError};
pub use forms::{
    ExpenditureForm, FormErrors, LoginForm, PasswordChangeForm, PasswordResetForm,
    PurseForm, PurseShareForm, SetPasswordForm, UserChangeForm, UserCreationForm,
};
pub use mail::{ConsoleMailer, Mail, Mailer, MemoryMailer};
pub use query::{ListParams, Page, PageInfo, PageRequest};
pub use recurrence::Occurrences;
pub use summary::{MonthTotals, YearSummary};
pub use tags::{TagStats, TagWeight};
pub use tracker::Tracker;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
