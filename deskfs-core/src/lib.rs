mod client;
mod item;

pub use client::{ApiErrorClass, ItemRow, TableClient, TableError};
pub use item::{Item, ItemKind, ItemType, icon_for};

use time::Date;

time::serde::format_description!(date_format, Date, "[year]-[month]-[day]");
