//! Data layer: remote store access, OME-Zarr reads, and in-memory volumes.
//!
//! ```text
//!  S3 HTTP mirror / local directory
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  remote  │  HttpStore: read-only zarrs storage over HTTP
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │   idr    │  open image + label arrays, read plane by plane
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────────┐
//!   │ Volume /     │  dense f32 intensities, sparse u32 labels,
//!   │ LabelVolume  │  per-plane views indexed by (t, c, z)
//!   └──────────────┘
//! ```

pub mod idr;
pub mod remote;
pub mod volume;
