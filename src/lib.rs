//! hakidgen - Pre-generated media pool served over HTTP
//!
//! hakidgen keeps a small pool of synthesized audio (optionally video)
//! artifacts ready so that a client can fetch one instantly instead of
//! waiting for text generation and speech synthesis.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        HTTP Service                          │
//! │     GET /pick          GET /health          GET /<path>      │
//! └───────────┬──────────────────┬────────────────────┬──────────┘
//!             │ pick             │ status             │ read
//! ┌───────────▼──────────────────▼──────────┐         │
//! │               Pool Manager              │         │
//! │  available: path -> (url, class)        │         │
//! │  pending:   path -> pick time           │         │
//! └───────────▲──────────────────┬──────────┘         │
//!             │ reclaim / ensure │ synthesize, write  │
//!             │ static / refill  │                    │
//! ┌───────────┴────────┐  ┌──────▼──────────┐  ┌──────▼──────────┐
//! │  Maintenance Loop  │  │   Generator     │  │ Artifact Store  │
//! │  (every interval)  │  │ (TTS + Gemini)  │  │ static/ genai/  │
//! └────────────────────┘  └─────────────────┘  └─────────────────┘
//! ```
//!
//! ## Artifact classes
//!
//! - **Static**: synthesized once from fixed text and kept forever.
//! - **Generative**: synthesized from generated text, handed out at most
//!   once, deleted after a grace window so a slow download can finish.
//!
//! ## Modules
//!
//! - [`pool`]: available / pending-deletion catalogs and their operations
//! - [`maintenance`]: periodic reclaim, refresh and generation task
//! - [`server`]: HTTP endpoints
//! - [`store`]: filesystem persistence
//! - [`generator`]: upstream synthesis and text generation
//! - [`setup`]: prompt definitions
//! - [`config`]: configuration management

pub mod config;
pub mod error;
pub mod generator;
pub mod maintenance;
pub mod media;
pub mod pool;
pub mod server;
pub mod setup;
pub mod store;

pub use config::ServiceConfig;
pub use error::{Error, Result};
