//! Configuration sections.
//!
//! | Section   | Purpose                                        |
//! |-----------|------------------------------------------------|
//! | `[serve]` | HTTP and WebSocket bind settings               |
//! | `[live]`  | Live document and browser-side observer tuning |

mod live;
mod serve;

pub use live::LiveSection;
pub use serve::ServeConfig;
