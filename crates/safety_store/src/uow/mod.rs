//! Unit of work: one session, three repositories, one commit point.
//!
//! # Responsibility
//! - Own one connection for the lifetime of a logical request.
//! - Hand out repositories that share that connection and staged write set.
//! - Coordinate explicit transactions and flush staged writes atomically.
//!
//! # Invariants
//! - A unit of work is single-writer: it is `!Sync`, so it cannot be shared
//!   across threads.
//! - An open transaction that was not committed is rolled back on disposal.

#[doc(hidden)]
pub mod session;
mod unit_of_work;

pub use session::{ChangeOperation, PendingChange};
pub use unit_of_work::{CancelHandle, UnitOfWork, UnitOfWorkState};
