//! FFI bridge to libretro cores for yearn
//!
//! `types` mirrors the libretro C header, `api` is the per-core function
//! table and `static_cores` binds the prefixed archives enabled through cargo
//! features.

pub mod api;
pub mod static_cores;
pub mod types;

pub use api::CoreApi;
