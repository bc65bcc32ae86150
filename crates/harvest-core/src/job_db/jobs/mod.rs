//! Download row CRUD, split into reads and writes.

mod read;
mod write;

pub(super) use read::{fetch_by_id, fetch_by_url};
