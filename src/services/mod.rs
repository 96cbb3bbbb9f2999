pub mod notifications;
pub mod scheduler;
pub mod shop_sync;
pub mod templates;

pub use notifications::{shop_callback_url, DispatcherSettings, MailWorker, NotificationDispatcher};
pub use scheduler::ShopSyncScheduler;
pub use shop_sync::{ShopSynchronizer, SyncReport};
pub use templates::{AskamaRenderer, MessageCatalog, NotificationContext, TemplateRenderer};
