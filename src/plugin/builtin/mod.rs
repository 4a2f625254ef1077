//! Built-in plugins.
//!
//! Each plugin submits a [`PluginConstructor`](super::PluginConstructor)
//! through `inventory`; the manager discovers them at startup.
//!
//! - `mailketing`: email content filter, dashboard widget, email settings
//! - `regions`: region management pages

pub mod mailketing;
pub mod regions;

pub use mailketing::MailketingPlugin;
pub use regions::RegionsPlugin;
