//! Bridge between a host experiment controller and the Open Ephys GUI's
//! event publisher: clock synchronization over digital lines, and spikes
//! re-stamped into host time.
//!
//! An [`EphysInterface`] owns an [`EventSource`] (normally a [`ZmqSource`]),
//! the [`DigitalOutput`] that writes the sync code, and a [`HostClock`].
//! Once started it runs a single processing thread until stopped.

pub mod clock;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod registry;
pub mod status;
pub mod sync;
pub mod transport;

pub use clock::{HostClock, HostTime, ManualClock, SystemClock};
pub use controller::{Device, EphysInterface};
pub use dispatch::{Dispatcher, SpikeRecord, SpikeSink};
pub use error::{LifecycleError, TransportError};
pub use registry::{ExternalSync, NotifierRegistry, SyncNotifier};
pub use status::{StatusSnapshot, SyncStatus};
pub use sync::{ClockOffset, DigitalOutput, SyncEngine, SyncOutcome, SyncTiming};
pub use transport::{EventSource, MockSource, Received, ZmqSource};
