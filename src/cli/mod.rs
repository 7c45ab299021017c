//! Command-line view helpers.
//!
//! The `keepr` binary is a thin view over [`crate::AccessControlEngine`]: it
//! renders the memory wall, a single memory, and the effective configuration,
//! and it forwards unlock intents.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `wall` | Load and list the viewer's memories |
//! | `show` | Show one memory |
//! | `unlock` | Submit a keyword for a locked memory |
//! | `add` | Create a keyword-locked memory |
//! | `session` | Store, clear, or inspect the bearer token |
//! | `config` | Print the effective configuration |
//!
//! # Example Usage
//!
//! ```bash
//! keepr session login --token "$KEEPR_TOKEN"
//! keepr wall --query beach --sort newest
//! keepr unlock 2 --keyword cherries
//! ```

mod input;
mod render;

pub use input::read_keyword;
pub use render::{OutputFormat, render_config, render_memory, render_wall};
