mod clock;
mod provisioner;
mod state;
mod transport;

pub use clock::ManualClock;
pub use provisioner::ScriptedProvisioner;
pub use state::MemoryStateStore;
pub use transport::MockTransport;
