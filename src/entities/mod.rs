// Entity records and their persistence
//
// Each module pairs a plain record type with free functions over a
// `rusqlite::Connection`. Access rules live in `tracker`, not here.

pub mod expenditure;
pub mod purse;
pub mod registration;
pub mod user;

pub use expenditure::{Expenditure, ExpenditureFilter, NewExpenditure};
pub use purse::Purse;
pub use registration::{Registration, RegistrationKind};
pub use user::{NewUser, User};
