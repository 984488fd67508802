//! # console-bridge
//!
//! Connects a host UI's interactive console panel to a script evaluator.
//!
//! ## Core Components
//!
//! - **Stream**: Duplex adapter; filters and buffers evaluator output, carries typed input
//! - **Filter**: Noise and error classification of outbound text
//! - **Evaluator**: Session thread driving an [`Evaluator`] implementation
//! - **Boot**: Boot script loading for a node endpoint
//! - **Controller**: Command relay, completion, context binding, boot sequencing
//! - **Protocol**: Request/reply envelope for the UI transport
//!
//! ## Example
//!
//! ```rust,ignore
//! use console_bridge::{
//!     BindingEvaluator, ConsoleConfig, ConsoleController, Environment, TemplateBootLoader,
//! };
//!
//! let env = Environment::new();
//! let controller = ConsoleController::new(
//!     ConsoleConfig::default(),
//!     env.clone(),
//!     BindingEvaluator::new(env),
//!     TemplateBootLoader::default(),
//! )?;
//!
//! controller.initialize_script_context("localhost", 8545).await?;
//! controller.send_input("web3.provider");
//! controller.settle().await?;
//! for record in controller.drain_buffer() {
//!     println!("{}", record.as_log_line());
//! }
//! ```

pub mod boot;
pub mod config;
pub mod controller;
pub mod environment;
pub mod error;
pub mod evaluator;
pub mod filter;
pub mod message;
pub mod protocol;
pub mod stream;

mod proptest;

// Re-exports for convenience
pub use boot::{BootScriptLoader, Endpoint, TemplateBootLoader, DEFAULT_BOOT_TEMPLATE};
pub use config::{ConsoleConfig, OverflowPolicy, StreamConfig};
pub use controller::{ConsoleController, DotCommand, InputDisposition};
pub use environment::Environment;
pub use error::{Error, Result};
pub use evaluator::{
    BindingEvaluator, Evaluator, ProcessEvaluator, ProcessEvaluatorConfig, SessionHandle,
};
pub use filter::{Classification, NoiseFilter};
pub use message::{MessageLevel, MessageRecord, Outbound};
pub use protocol::{CompletionResult, ConsoleReply, ConsoleRequest};
pub use stream::{InboundReader, SessionInput, StreamAdapter, StreamStats};
