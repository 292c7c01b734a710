//! Publisher Implementations
//!
//! The [`crate::types::Publisher`] trait is the boundary the run loop sees;
//! the only production implementation drives a browser over the WebDriver
//! protocol. Tests substitute their own fakes.

pub mod webdriver;

pub use webdriver::WebDriverPublisher;
