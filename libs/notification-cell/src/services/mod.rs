pub mod dispatch;
pub mod notification;

pub use dispatch::{EmailDispatcher, NotificationDispatcher, SmsDispatcher};
pub use notification::NotificationService;
