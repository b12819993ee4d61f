//! Kiln Scripting Bridge
//!
//! Lets behavior code read and mutate engine-owned entity state through
//! lightweight handles, and lets the engine drive that code once per frame.
//!
//! ## Architecture
//!
//! - **Port:** [`InternalCalls`], one method per boundary-crossing operation,
//!   implemented by the engine's [`kiln_core::Scene`] and by test doubles
//! - **Handles:** [`Entity`] and [`Transform`] hold only an ID; every property
//!   access is one live call through the port
//! - **Lifecycle:** [`Behavior`] hooks driven by [`ScriptEngine`]
//! - **Hosts:** JavaScript via QuickJS ([`runtime`]) and a C ABI ([`ffi`])
//!   for foreign script VMs

pub mod behavior;
pub mod calls;
pub mod engine;
pub mod entity;
pub mod error;
pub mod ffi;
pub mod metrics;
pub mod registry;
pub mod runtime;
pub mod testing;

pub use behavior::{Behavior, ScriptContext};
pub use calls::{Instrumented, InternalCall, InternalCalls, SharedCalls};
pub use engine::{EngineConfig, Hook, HookFailure, InstanceId, LifecycleState, ScriptEngine, StepReport};
pub use entity::{Entity, Transform};
pub use error::{BridgeError, Result};
pub use metrics::CallCounter;
pub use registry::BehaviorRegistry;
pub use runtime::{ScriptBehavior, ScriptRuntime};

pub use rquickjs;
