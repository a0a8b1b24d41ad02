// jointly-api: Async WebSocket client for robot telemetry bridges

pub mod error;
pub mod frame;
pub mod protocol;
pub mod socket;

pub use error::Error;
pub use frame::{BatteryState, JointReading, RobotState};
pub use socket::{BridgeSocket, ConnectionStatus, SocketConfig, SocketHandle};
