pub mod check;
pub mod roundtrip;
pub mod sync;

pub use check::{check, CheckArgs};
pub use roundtrip::{roundtrip, RoundtripArgs};
pub use sync::{sync, SyncArgs};
