//! C ABI for the internal calls
//!
//! Lets a foreign script VM bind the eight boundary-crossing functions by
//! address. Every type crossing here is `#[repr(C)]`.
//!
//! Conventions:
//! - reads write their result through an out-parameter and return a status
//! - writes take the value by pointer and copy it; the caller keeps ownership
//! - names cross as NUL-terminated UTF-8

use crate::calls::{InternalCall, InternalCalls};
use crate::error::BridgeError;
use kiln_core::{EntityId, Vector3};
use std::ffi::{c_char, c_void, CStr};

/// ABI version for compatibility checks by the host.
pub const KILN_FFI_API_VERSION: u32 = 1;

/// Vector3 with a fixed C layout.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FfiVector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl FfiVector3 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl From<Vector3> for FfiVector3 {
    fn from(v: Vector3) -> Self {
        Self { x: v.x, y: v.y, z: v.z }
    }
}

impl From<FfiVector3> for Vector3 {
    fn from(v: FfiVector3) -> Self {
        Vector3::new(v.x, v.y, v.z)
    }
}

/// Outcome of every exported call.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiStatus {
    Ok = 0,
    EntityNotFound = 1,
    NullEntity = 2,
    /// Null engine or out pointer
    InvalidArgument = 3,
    Utf8Error = 4,
    /// Caller buffer cannot hold the result; the required length was reported
    BufferTooSmall = 5,
    Failed = 6,
}

impl From<&BridgeError> for FfiStatus {
    fn from(error: &BridgeError) -> Self {
        match error {
            BridgeError::EntityNotFound(_) => FfiStatus::EntityNotFound,
            BridgeError::NullEntity => FfiStatus::NullEntity,
            BridgeError::Marshal(_) => FfiStatus::InvalidArgument,
            _ => FfiStatus::Failed,
        }
    }
}

fn status_of(result: crate::Result<()>) -> FfiStatus {
    match result {
        Ok(()) => FfiStatus::Ok,
        Err(e) => {
            tracing::debug!(error = %e, "ffi call failed");
            FfiStatus::from(&e)
        }
    }
}

/// Opaque engine handle handed to the foreign side.
pub struct FfiEngine {
    calls: Box<dyn InternalCalls>,
}

impl FfiEngine {
    pub fn new(calls: Box<dyn InternalCalls>) -> Self {
        Self { calls }
    }

    /// Leak into a raw pointer for the foreign side. Release with
    /// [`kiln_engine_free`] or [`FfiEngine::from_raw`].
    pub fn into_raw(self) -> *mut FfiEngine {
        Box::into_raw(Box::new(self))
    }

    /// # Safety
    /// `ptr` must come from [`FfiEngine::into_raw`] and not have been freed.
    pub unsafe fn from_raw(ptr: *mut FfiEngine) -> Self {
        *Box::from_raw(ptr)
    }

    pub fn calls(&self) -> &dyn InternalCalls {
        &*self.calls
    }
}

/// # Safety
/// `engine` must be null or come from [`FfiEngine::into_raw`]; it is invalid afterwards.
#[no_mangle]
pub unsafe extern "C" fn kiln_engine_free(engine: *mut FfiEngine) {
    if !engine.is_null() {
        drop(FfiEngine::from_raw(engine));
    }
}

// ============================================================================
// Entity
// ============================================================================

/// Copy the entity's name into `buf` as NUL-terminated UTF-8.
///
/// The name length in bytes (without the terminator) is written to
/// `out_len` whenever the entity exists, so a caller can retry with a larger
/// buffer after `BufferTooSmall`.
///
/// # Safety
/// `engine` must be a live engine pointer; `buf` must be null or valid for
/// `cap` bytes; `out_len` must be null or valid for one write.
#[no_mangle]
pub unsafe extern "C" fn kiln_entity_get_name(
    engine: *const FfiEngine,
    id: u32,
    buf: *mut c_char,
    cap: usize,
    out_len: *mut usize,
) -> FfiStatus {
    let Some(engine) = engine.as_ref() else {
        return FfiStatus::InvalidArgument;
    };
    let name = match engine.calls.entity_get_name(EntityId::from_raw(id)) {
        Ok(name) => name,
        Err(e) => return FfiStatus::from(&e),
    };

    let bytes = name.as_bytes();
    if let Some(out_len) = out_len.as_mut() {
        *out_len = bytes.len();
    }
    if buf.is_null() || cap < bytes.len() + 1 {
        return FfiStatus::BufferTooSmall;
    }

    std::ptr::copy_nonoverlapping(bytes.as_ptr(), buf.cast::<u8>(), bytes.len());
    *buf.add(bytes.len()) = 0;
    FfiStatus::Ok
}

/// # Safety
/// `engine` must be a live engine pointer; `name` must be null or a
/// NUL-terminated string valid for reads.
#[no_mangle]
pub unsafe extern "C" fn kiln_entity_set_name(engine: *mut FfiEngine, id: u32, name: *const c_char) -> FfiStatus {
    let Some(engine) = engine.as_mut() else {
        return FfiStatus::InvalidArgument;
    };
    if name.is_null() {
        return FfiStatus::InvalidArgument;
    }
    let Ok(name) = CStr::from_ptr(name).to_str() else {
        return FfiStatus::Utf8Error;
    };
    status_of(engine.calls.entity_set_name(EntityId::from_raw(id), name))
}

// ============================================================================
// Transform
// ============================================================================

unsafe fn read_vector(
    engine: *const FfiEngine,
    out: *mut FfiVector3,
    read: impl FnOnce(&dyn InternalCalls) -> crate::Result<Vector3>,
) -> FfiStatus {
    let (Some(engine), Some(out)) = (engine.as_ref(), out.as_mut()) else {
        return FfiStatus::InvalidArgument;
    };
    match read(&*engine.calls) {
        Ok(v) => {
            *out = v.into();
            FfiStatus::Ok
        }
        Err(e) => FfiStatus::from(&e),
    }
}

unsafe fn write_vector(
    engine: *mut FfiEngine,
    value: *const FfiVector3,
    write: impl FnOnce(&mut dyn InternalCalls, &Vector3) -> crate::Result<()>,
) -> FfiStatus {
    let (Some(engine), Some(value)) = (engine.as_mut(), value.as_ref()) else {
        return FfiStatus::InvalidArgument;
    };
    let value = Vector3::from(*value);
    status_of(write(&mut *engine.calls, &value))
}

/// # Safety
/// `engine` must be a live engine pointer; `out` must be valid for one write.
#[no_mangle]
pub unsafe extern "C" fn kiln_transform_get_position(engine: *const FfiEngine, id: u32, out: *mut FfiVector3) -> FfiStatus {
    read_vector(engine, out, |c| c.transform_get_position(EntityId::from_raw(id)))
}

/// # Safety
/// `engine` must be a live engine pointer; `value` must be valid for one read.
#[no_mangle]
pub unsafe extern "C" fn kiln_transform_set_position(engine: *mut FfiEngine, id: u32, value: *const FfiVector3) -> FfiStatus {
    write_vector(engine, value, |c, v| c.transform_set_position(EntityId::from_raw(id), v))
}

/// # Safety
/// `engine` must be a live engine pointer; `out` must be valid for one write.
#[no_mangle]
pub unsafe extern "C" fn kiln_transform_get_rotation(engine: *const FfiEngine, id: u32, out: *mut FfiVector3) -> FfiStatus {
    read_vector(engine, out, |c| c.transform_get_rotation(EntityId::from_raw(id)))
}

/// # Safety
/// `engine` must be a live engine pointer; `value` must be valid for one read.
#[no_mangle]
pub unsafe extern "C" fn kiln_transform_set_rotation(engine: *mut FfiEngine, id: u32, value: *const FfiVector3) -> FfiStatus {
    write_vector(engine, value, |c, v| c.transform_set_rotation(EntityId::from_raw(id), v))
}

/// # Safety
/// `engine` must be a live engine pointer; `out` must be valid for one write.
#[no_mangle]
pub unsafe extern "C" fn kiln_transform_get_scale(engine: *const FfiEngine, id: u32, out: *mut FfiVector3) -> FfiStatus {
    read_vector(engine, out, |c| c.transform_get_scale(EntityId::from_raw(id)))
}

/// # Safety
/// `engine` must be a live engine pointer; `value` must be valid for one read.
#[no_mangle]
pub unsafe extern "C" fn kiln_transform_set_scale(engine: *mut FfiEngine, id: u32, value: *const FfiVector3) -> FfiStatus {
    write_vector(engine, value, |c, v| c.transform_set_scale(EntityId::from_raw(id), v))
}

// ============================================================================
// Registration
// ============================================================================

/// Every exported internal call with its address, in [`InternalCall::ALL`] order.
pub fn internal_call_table() -> [(InternalCall, *const c_void); InternalCall::COUNT] {
    [
        (InternalCall::EntityGetName, kiln_entity_get_name as *const c_void),
        (InternalCall::EntitySetName, kiln_entity_set_name as *const c_void),
        (InternalCall::TransformGetPosition, kiln_transform_get_position as *const c_void),
        (InternalCall::TransformSetPosition, kiln_transform_set_position as *const c_void),
        (InternalCall::TransformGetRotation, kiln_transform_get_rotation as *const c_void),
        (InternalCall::TransformSetRotation, kiln_transform_set_rotation as *const c_void),
        (InternalCall::TransformGetScale, kiln_transform_get_scale as *const c_void),
        (InternalCall::TransformSetScale, kiln_transform_set_scale as *const c_void),
    ]
}

/// Hand each internal call to a host registration hook under its stable name.
pub fn register_internal_calls(mut register: impl FnMut(&'static str, *const c_void)) {
    for (call, address) in internal_call_table() {
        tracing::debug!(call = call.name(), "registering internal call");
        register(call.name(), address);
    }
}
