// ── Reactive data store ──
//
// Room list, per-room detail and log buffers, keyed by room id.
// Detail and logs exist only for expanded rooms.

mod data_store;

pub use data_store::DataStore;
