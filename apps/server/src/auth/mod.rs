pub mod cron;

pub use cron::{CronAuth, CRON_SECRET_HEADER};
