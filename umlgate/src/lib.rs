//! # umlgate
//!
//! A hardening layer in front of a text-to-diagram engine. Diagram sources are
//! untrusted input: their inclusion directives could make the engine read local
//! files or fetch arbitrary URLs, and a pathological diagram can keep the engine
//! busy forever.
//!
//! umlgate addresses both:
//!
//! - **Directive sanitizer** (`sanitizer`): statically removes `!include`,
//!   `!includeurl` and `!includesub` directives according to a [`SafeMode`]
//!   policy, an include [`Whitelist`] and the set of bundled libraries.
//! - **Render harness** (`harness`): runs the blocking engine on dedicated worker
//!   threads with a hard per-task deadline and a bounded number of outstanding
//!   tasks, so stuck renders can neither block the async runtime nor pile up.
//!
//! [`DiagramGateway`] wires the two together behind one immutable
//! [`GatewayConfig`].
//!
//! ## Modules
//!
//! - **`config`**: `Settings` and the resolved `GatewayConfig`.
//! - **`safe_mode`**: the three policy levels.
//! - **`whitelist`**: include whitelist and its loader.
//! - **`sanitizer`**: directive grammar, classification and the sanitize pass.
//! - **`diagram`**: locating the `@start`/`@end` block.
//! - **`render`**: the `RenderAdapter` seam and the bundled text engine.
//! - **`harness`**: the render pool.
//! - **`gateway`**: the end-to-end request path.
//! - **`shell`**: the `umlgate` command-line front end.

pub mod config;
pub mod diagram;
pub mod error;
pub mod gateway;
pub mod harness;
pub mod render;
pub mod safe_mode;
pub mod sanitizer;
pub mod shell;
pub mod utils;
pub mod whitelist;

// Test utilities
pub mod test_utils;

pub use config::{GatewayConfig, Settings};
pub use error::{EngineError, RenderError};
pub use gateway::DiagramGateway;
pub use harness::{ExecutionOutcome, ExecutionTask, PoolConfig, RenderPool};
pub use render::{OutputFormat, RenderAdapter, RenderRequest, SequenceTextEngine};
pub use safe_mode::SafeMode;
pub use sanitizer::{StdlibRegistry, sanitize};
pub use whitelist::{Whitelist, load_whitelist};
