//! # voltgate-automation
//!
//! Rule storage and the monitoring engine that drives vehicle automations.
//!
//! ## Overview
//!
//! This crate turns persisted automation rules into vehicle commands and
//! notifications. Rules live in the gateway's config store; the engine
//! polls vehicle state and the wall clock and executes matching rules
//! through the gateway.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`store`] | CRUD over persisted rules, seeded with starter rules |
//! | [`condition`] | The small condition language for state triggers |
//! | [`engine`] | Periodic state and time passes, action dispatch |
//!
//! ## Features
//!
//! - **Write-through persistence**: every rule mutation is saved before it
//!   is visible, so a restart never loses or resurrects a rule
//! - **Two independent passes**: vehicle-state conditions and time-of-day
//!   schedules run on their own intervals and never overlap themselves
//! - **Failure isolation**: a failing action stops only its own rule and
//!   raises a high-priority notification
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use voltgate_automation::{AutomationEngine, EngineConfig, RuleStore};
//! use voltgate_core::{GatewayBuilder, GatewaySettings, TracingSink, VehicleId};
//!
//! let settings = GatewaySettings::default();
//! let gateway = Arc::new(GatewayBuilder::new(settings.clone()).build());
//! let store = Arc::new(RuleStore::open(config_store).await?);
//!
//! let engine = Arc::new(AutomationEngine::new(
//!     gateway,
//!     store,
//!     Arc::new(TracingSink),
//!     VehicleId::parse("5YJ3E1EA7KF000001")?,
//!     EngineConfig::from_settings(&settings),
//! ));
//! engine.start();
//! ```

pub mod condition;
pub mod engine;
pub mod store;

// Re-export commonly used types at crate root
pub use engine::{AutomationEngine, EngineConfig};
pub use store::{RuleStore, RuleUpdate};
