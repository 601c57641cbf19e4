//! tether-test-utils: Test infrastructure for tether.
//!
//! Provides:
//! - MockTransport: Scripted transport and factory with a shared call log
//! - ScriptedProbe: Reachability probe that replays a fixed sequence
//! - RecordingObserver / RecordingSurface: Capture session callbacks
//! - EchoServer / StubProxy: Loopback servers for real-socket tests

mod mock_transport;
mod recorder;
mod scripted_probe;
mod stub_net;

pub use mock_transport::{ConnectOutcome, MockTransport, MockTransportFactory};
pub use recorder::{ObservedEvent, RecordingObserver, RecordingSurface};
pub use scripted_probe::ScriptedProbe;
pub use stub_net::{EchoServer, ProxyRequest, StubProxy};
