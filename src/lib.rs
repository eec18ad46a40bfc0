use chrono::{NaiveDate, Utc};

mod casing;
mod report;
mod aggregate;
mod csse;
mod snapshot;

pub use casing::*;
pub use report::*;
pub use aggregate::*;
pub use csse::*;
pub use snapshot::*;


pub fn naive_today() -> NaiveDate {
	Utc::today().naive_local()
}
