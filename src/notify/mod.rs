mod bus;
mod types;

pub use bus::{NotificationBus, DEFAULT_NOTIFICATION_LIFETIME};
pub use types::{Notification, NotificationId, NotificationKind};
