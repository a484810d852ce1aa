//! Identifiers and opaque handles.
//!
//! Three families of identity flow through the bridge:
//!
//! - **Host identities** ([`NodeRef`], [`MaterialRef`]): supplied by the host
//!   application. They are only used as map keys and as query arguments.
//! - **Core identities** ([`ShapeId`], [`MaterialId`]): generation-tagged
//!   `slotmap` keys allocated by the bridge itself. A stale key never aliases
//!   a newer object even if the host reuses one of its own identities.
//! - **Backend handles** ([`ShapeHandle`], [`ShaderHandle`], ...): returned by
//!   the render backend when it creates an object.

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Index of a shape record in the synchronizer's arena.
    pub struct ShapeId;
    /// Stable core identity of a host material.
    pub struct MaterialId;
}

/// Host scene node identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeRef(pub u64);

/// Host material identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MaterialRef(pub u64);

/// Host animation time, in host ticks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeValue(pub i32);

macro_rules! backend_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);
    };
}

backend_handle!(
    /// Backend mesh shape (or shape instance).
    ShapeHandle
);
backend_handle!(
    /// Backend surface shader.
    ShaderHandle
);
backend_handle!(
    /// Backend volume shader.
    VolumeShaderHandle
);
backend_handle!(
    /// Backend camera.
    CameraHandle
);
