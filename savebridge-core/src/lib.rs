/*!
# SaveBridge Core Engine

Sync and inspect Balatro save slots across the game's two storage layouts.

The Steam build keeps each slot as `meta.jkr` and `profile.jkr` files in a
slot directory; the Apple Arcade build keeps every slot as data fields inside
one preferences property list. This crate provides:

- A single storage abstraction over both layouts
- The game's raw deflate blob codec, plus base64 transport helpers
- A decoder for the Lua table literals inside decompressed blobs
- A sync engine that copies slots verbatim or decodes them for display

## Architecture

The core follows hexagonal architecture principles:
- The sync engine only talks to the `SaveStorage` port
- Each on-disk layout is an adapter
- Decoding is read-only; blobs are never rewritten from decoded data

## Usage

```rust,no_run
use savebridge_core::{create_default_engine, BackendKind, SaveLocations, Slot};

let locations = SaveLocations::from_env()?;
let mut arcade = locations.open_backend(BackendKind::Arcade);
let mut steam = locations.open_backend(BackendKind::Steam);
let engine = create_default_engine();

// Copy Arcade slot 1 into Steam slot 2
engine.sync(&mut arcade, Slot::One, &mut steam, Slot::Two)?;

// Decode Steam slot 2 for display
let report = engine.inspect(&mut steam, Slot::Two)?;
println!("{}", report.to_json_pretty()?);
# Ok::<(), savebridge_core::SaveError>(())
```
*/

pub mod compression;
pub mod config;
pub mod error;
pub mod observability;
pub mod slot;
pub mod storage;
pub mod sync;
pub mod table;

#[cfg(test)]
mod error_tests;

pub use compression::{
    base64_and_inflate, base64_decode, base64_encode, compress, compress_and_base64, decompress,
    CompressionAdapter, RawDeflate,
};
pub use config::{BackendKind, SaveLocations};
pub use error::{Result, SaveError, StorageError};
pub use slot::{BlobKind, LoadedSlot, SaveBlobs, Slot, SlotStatus};
pub use storage::{BackendState, ContainerStorage, DirectoryStorage, SaveStorage};
pub use sync::{create_default_engine, InspectReport, SaveSyncEngine};
pub use table::Value;
